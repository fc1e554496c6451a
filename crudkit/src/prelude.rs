//! Convenient re-exports of commonly used types from crudkit.
//!
//! ```ignore
//! use crudkit::prelude::*;
//! ```

pub use crudkit_core::{
    client::{ClientSettings, DatabaseClient, DEFAULT_CI_COLLATION},
    crud::CrudOperations,
    document::{Document, SqlResultSet},
    error::{DbError, DbResult, db_errors},
    filter::{Condition, Filter, FilterCondition, FilterCriteria, FilterGroup, FilterItem, FilterOperation, GroupOperation},
    group::{Aggregate, Group, GroupCondition},
    ident::{generate_id, generate_var_name},
    mapper::{ErrorsMapper, register_db_user_friendly_exceptions},
    page::{DEFAULT_PAGE_SIZE, OffsetPagination, Page, PaginatedSet, calculate_limit, calculate_total_pages, limit_offset, offset_pagination, result_set},
    schema::{DocumentSchema, DocumentValidation},
    sort::{Order, Sort, SortCondition, Sorting, sort_by},
};

pub use crudkit_docstore::{DocStoreClient, DocStoreCrud};
pub use crudkit_sql::{SqlClient, SqlCrud};
