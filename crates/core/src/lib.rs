// crates/core/src/lib.rs
//! Domain types and pure logic for gitscout: models, store traits,
//! repository/issue scoring, the matching engine, and the LLM provider
//! abstraction. Everything here is IO-free except the GLM client in
//! [`llm`].

pub mod llm;
pub mod matching;
pub mod models;
pub mod scoring;
pub mod store;

pub use models::{
    Category, DeepDive, FeedFilter, Issue, IssuePage, IssueSkill, IssueStatus, Job, JobStatus,
    JobType, NewDeepDive, NewIssue, NewRepository, NewUser, RefreshToken, RepoListItem,
    Repository, Role, SkillSource, User, UserProfile, UserSkill, UserSummary,
};
pub use store::{
    CategoryStore, DeepDiveStore, IssueStore, RefreshTokenStore, RepoStore, SavedIssueStore,
    StoreError, StoreResult, UserStore,
};
