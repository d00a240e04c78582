// OAuth2 relying-party flow pieces: in-flight state, account linking, and
// stored-token helpers.

pub mod link_account;
pub mod state;
pub mod token_utils;

pub use link_account::{handle_oauth_user_info, LinkAccountOptions, OAuthCallbackOutcome};
pub use state::{generate_state, parse_state, StateData, StateError, StateErrorCode};
