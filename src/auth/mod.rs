// Authentication module
// Turns bearer JWTs issued by the account service into caller identities

pub mod error;
pub mod middleware;
pub mod models;
pub mod token;

// Re-export commonly used types
pub use error::AuthError;
pub use middleware::{AdminUser, AuthenticatedUser};
pub use models::Role;
pub use token::{Claims, TokenService};
