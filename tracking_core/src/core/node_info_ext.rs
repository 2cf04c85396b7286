//! Extension trait for `Option<&mut NodeInfo>` to simplify logging
//!
//! Allows `ctx.log_debug("message")` inside `tick` instead of matching on the
//! optional context every time.

use super::NodeInfo;

/// Extension trait for Option<&mut NodeInfo> to enable direct logging calls
pub trait NodeInfoExt {
    fn log_debug(&mut self, message: &str);

    fn log_info(&mut self, message: &str);

    fn log_warning(&mut self, message: &str);

    fn log_error(&mut self, message: &str);

    fn fail_tick(&mut self, message: &str);
}

impl NodeInfoExt for Option<&mut NodeInfo> {
    #[inline]
    fn log_debug(&mut self, message: &str) {
        if let Some(ref mut ctx) = self {
            ctx.log_debug(message);
        }
    }

    #[inline]
    fn log_info(&mut self, message: &str) {
        if let Some(ref mut ctx) = self {
            ctx.log_info(message);
        }
    }

    #[inline]
    fn log_warning(&mut self, message: &str) {
        if let Some(ref mut ctx) = self {
            ctx.log_warning(message);
        }
    }

    #[inline]
    fn log_error(&mut self, message: &str) {
        if let Some(ref mut ctx) = self {
            ctx.log_error(message);
        }
    }

    #[inline]
    fn fail_tick(&mut self, message: &str) {
        match self {
            Some(ref mut ctx) => ctx.fail_tick(message.to_string()),
            None => tracing::error!("{}", message),
        }
    }
}
