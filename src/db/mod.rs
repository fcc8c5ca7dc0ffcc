pub mod article_store;
pub mod interaction_store;
pub mod memory;
pub mod user_store;

pub use article_store::{ArticleQuery, ArticleStore, CandidateOrder, PgArticleStore};
pub use interaction_store::{InteractionStore, PgInteractionStore};
pub use memory::{MemoryArticleStore, MemoryInteractionStore, MemoryUserStore};
pub use user_store::{PgUserStore, UserStore};
