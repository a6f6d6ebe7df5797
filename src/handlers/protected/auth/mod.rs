pub mod me; // GET /auth/me - claims of the presented token

pub use me::me_get;
