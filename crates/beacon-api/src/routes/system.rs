//! System info route.

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};

/// `GET /system` — the envelope's meta block (time, version) is the
/// payload; results stay null.
pub async fn info(_ctx: RequestContext) -> HandlerReply {
    Rendered::empty().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{make_ctx, test_state};

    #[tokio::test]
    async fn returns_an_empty_success() {
        let (state, _backend) = test_state();
        let ctx = make_ctx(&state, &[], "/system", &[], Vec::new());

        match info(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                assert!(rendered.results.is_null());
            }
            _ => panic!("expected a rendered reply"),
        }
    }
}
