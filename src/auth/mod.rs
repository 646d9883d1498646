pub mod authenticator;
pub mod password;
pub mod token;

pub use authenticator::{authenticate, AuthError};
pub use token::{Claims, TokenError, TokenService};
