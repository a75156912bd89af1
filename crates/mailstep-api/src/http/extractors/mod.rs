pub mod body;
pub mod token;

pub use body::CallbackBody;
pub use token::CallbackToken;
