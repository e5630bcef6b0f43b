//! プロダクト保存先
//!
//! - `SupabaseStore`: PostgREST 経由でホスト型DBに保存
//! - `MemoryStore`: プロセス内 (dry-run / テスト)

mod memory;
mod supabase;
mod types;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
pub use types::{
    ProductPage, ProductQuery, ProductRow, SortField, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
