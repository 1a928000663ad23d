mod subscription;
mod travis_repo_url;
mod user_id;

pub use subscription::*;
pub use travis_repo_url::*;
pub use user_id::*;
