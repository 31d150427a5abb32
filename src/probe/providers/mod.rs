pub mod brew;
pub mod github_commit;
pub mod github_pr;
pub mod github_release;
pub mod npm;
