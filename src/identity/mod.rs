//! Session and authorization for the client.
//! Keep the public surface thin and split implementation across sub-modules.

mod profile;
mod token_store;
mod session;
mod guard;

pub use profile::{Role, UserProfile};
pub use token_store::{TokenStore, MemoryTokenStore, FileTokenStore, StoredSession, SessionToken, StoreError};
pub use session::{SessionState, SessionCell, SessionController};
pub use guard::{
    Route, Access, RouteDecision, Navigation, Navigator, admit, admit_access, home_path,
    ROOT_PATH, LOGIN_PATH, REGISTER_PATH, CITIZEN_HOME, OFFICER_HOME,
};
