//! ERP integration adapters
//!
//! - [`ErpOAuthClient`]: the ERP's OAuth2 token endpoint (authorization-code
//!   and refresh-token grants, HTTP Basic client authentication)
//! - [`ErpMirror`]: maps internal entities onto the ERP's REST resources

pub mod mirror;
pub mod oauth;

pub use mirror::ErpMirror;
pub use oauth::ErpOAuthClient;
