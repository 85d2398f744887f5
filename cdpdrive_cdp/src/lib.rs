use crate::cdp::browser_protocol::network::{CookieParam, DeleteCookiesParams};
use crate::cdp::browser_protocol::target::CreateTargetParams;

// Generated from js_protocol.pdl / browser_protocol.pdl by cdpdrive_pdl;
// kept in sync by the `generated_code_is_fresh` test in tests/generate.rs.
include!("cdp.rs");

/// convenience fixups
impl Default for CreateTargetParams {
    fn default() -> Self {
        "about:blank".into()
    }
}

impl DeleteCookiesParams {
    /// Create a new instance from a `CookieParam`
    pub fn from_cookie(param: &CookieParam) -> Self {
        DeleteCookiesParams {
            name: param.name.clone(),
            url: param.url.clone(),
            domain: param.domain.clone(),
            path: param.path.clone(),
        }
    }
}
