// Route handlers. Each takes the shared context plus a parsed request and
// returns a typed result together with the cookies to set; the HTTP
// framework layer does the rest.

pub mod account;
pub mod callback;
pub mod session;
pub mod sign_in;
pub mod sign_out;
