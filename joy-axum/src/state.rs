use std::sync::Arc;

use joy_core::handler::RequestHandler;
use joy_core::runtime::Runtime;

pub struct JoyAxumState<Rt: Runtime> {
    pub handler: Arc<RequestHandler<Rt>>,
}

impl<Rt: Runtime> Clone for JoyAxumState<Rt> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<Rt: Runtime> JoyAxumState<Rt> {
    pub fn new(handler: RequestHandler<Rt>) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}
