//! Page Components

mod cart;
mod home;
mod signup;
mod success;

pub use cart::CartPage;
pub use home::HomePage;
pub use signup::SignUpPage;
pub use success::SuccessPage;
