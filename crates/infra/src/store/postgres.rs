//! Postgres-backed store.
//!
//! ## Atomicity
//!
//! Every ledger write runs in one transaction that locks the account row with
//! `SELECT ... FOR UPDATE`, decides the change with the pure domain code,
//! then updates the quantity and appends the entry. Writers to the same
//! account queue on the row lock; other accounts are unaffected. Task status
//! changes lock the task row and re-check the status they expect.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | InfraError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Domain(DuplicateCode)` |
//! | Database (foreign key violation) | `23503` | `Domain(NotFound)` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_catalog::{SpecCategory, SpecCombination, SpecOption};
use stockledger_core::{
    AccountId, ActorId, DomainError, LedgerEntryId, LocationId, ProductId,
    ReconciliationItemId, ReconciliationTaskId, SpecCategoryId, SpecOptionId,
};
use stockledger_inventory::{
    AccountUpdate, ChangeRequest, ChangeSource, InventoryAccount, LedgerEntry, OpenAccount,
    OpenedAccount, ReconciliationItem, ReconciliationTask,
};
use stockledger_products::{NewProduct, Product, resolve};

use super::{AccountListing, InventoryStore};
use crate::error::{InfraError, InfraResult};
use crate::ledger_query::{LedgerFilter, LedgerPage, LedgerRow, Pagination};

const SCHEMA: &str = include_str!("../../migrations/0001_stockledger.sql");

const CATEGORY_COLUMNS: &str = "id, code, name, sort_order, is_active";
const OPTION_COLUMNS: &str = "id, category_id, value, sort_order, is_active";
const PRODUCT_COLUMNS: &str =
    "id, name, spec_combination, external_code, is_active, remark, created_at";
const ACCOUNT_COLUMNS: &str = "id, product_id, location_id, display_name, quantity, warning_min, \
     warning_max, cost_price, is_frozen, created_at";
const TASK_COLUMNS: &str =
    "id, location_id, status, remark, created_by, created_at, confirmed_by, confirmed_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> InfraResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables, indexes and the append-only trigger. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> InfraResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn load_items(&self, task_id: ReconciliationTaskId) -> InfraResult<Vec<ReconciliationItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, task_id, account_id, system_quantity, actual_quantity, difference, applied_entry
            FROM reconciliation_items
            WHERE task_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(*task_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        rows.iter().map(item_from_row).collect()
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresStore {
    #[instrument(skip(self, category), fields(code = %category.code), err)]
    async fn insert_category(&self, category: SpecCategory) -> InfraResult<()> {
        sqlx::query(
            r#"
            INSERT INTO spec_categories (id, code, name, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*category.id.as_uuid())
        .bind(&category.code)
        .bind(&category.name)
        .bind(category.sort_order)
        .bind(category.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_category(&self, id: SpecCategoryId) -> InfraResult<Option<SpecCategory>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM spec_categories WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_category", e))?;

        row.as_ref().map(category_from_row).transpose()
    }

    #[instrument(skip(self, category), fields(id = %category.id), err)]
    async fn save_category(&self, category: &SpecCategory) -> InfraResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE spec_categories
            SET name = $2, sort_order = $3, is_active = $4
            WHERE id = $1
            "#,
        )
        .bind(*category.id.as_uuid())
        .bind(&category.name)
        .bind(category.sort_order)
        .bind(category.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_category", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("specification category").into());
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_categories(&self) -> InfraResult<Vec<SpecCategory>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM spec_categories ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;

        rows.iter().map(category_from_row).collect()
    }

    #[instrument(skip(self, option), fields(category_id = %option.category_id), err)]
    async fn insert_option(&self, option: SpecOption) -> InfraResult<()> {
        sqlx::query(
            r#"
            INSERT INTO spec_options (id, category_id, value, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*option.id.as_uuid())
        .bind(*option.category_id.as_uuid())
        .bind(&option.value)
        .bind(option.sort_order)
        .bind(option.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_option", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_option(&self, id: SpecOptionId) -> InfraResult<Option<SpecOption>> {
        let row = sqlx::query(&format!(
            "SELECT {OPTION_COLUMNS} FROM spec_options WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_option", e))?;

        row.as_ref().map(option_from_row).transpose()
    }

    #[instrument(skip(self, option), fields(id = %option.id), err)]
    async fn save_option(&self, option: &SpecOption) -> InfraResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE spec_options
            SET value = $2, sort_order = $3, is_active = $4
            WHERE id = $1
            "#,
        )
        .bind(*option.id.as_uuid())
        .bind(&option.value)
        .bind(option.sort_order)
        .bind(option.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_option", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("specification option").into());
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_options(&self) -> InfraResult<Vec<SpecOption>> {
        let rows = sqlx::query(&format!(
            "SELECT {OPTION_COLUMNS} FROM spec_options ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_options", e))?;

        rows.iter().map(option_from_row).collect()
    }

    #[instrument(skip(self, request), err)]
    async fn create_product(&self, request: NewProduct) -> InfraResult<Product> {
        let spec_key = request.spec_combination.canonical_key();
        let external_code = request
            .external_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE spec_key = $1 OR ($2::text IS NOT NULL AND external_code = $2)"
        ))
        .bind(&spec_key)
        .bind(external_code.as_deref())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;
        let existing = rows.iter().map(product_from_row).collect::<InfraResult<Vec<_>>>()?;

        let product = resolve(existing.iter(), request)?;

        // A concurrent insert of the same combination loses on the unique key.
        let inserted = sqlx::query(
            r#"
            INSERT INTO products (id, name, spec_combination, spec_key, external_code, is_active, remark, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (spec_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(product.spec_combination.to_json())
        .bind(&spec_key)
        .bind(product.external_code.as_deref())
        .bind(product.is_active)
        .bind(product.remark.as_deref())
        .bind(product.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;

        if inserted.is_none() {
            let winner: Uuid = sqlx::query_scalar("SELECT id FROM products WHERE spec_key = $1")
                .bind(&spec_key)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_product", e))?;
            return Err(DomainError::AlreadyExists {
                product_id: ProductId::from_uuid(winner),
            }
            .into());
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(product)
    }

    #[instrument(skip(self), err)]
    async fn get_product(&self, id: ProductId) -> InfraResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, combination), err)]
    async fn find_product(&self, combination: &SpecCombination) -> InfraResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE spec_key = $1"
        ))
        .bind(combination.canonical_key())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> InfraResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn product_combinations(&self) -> InfraResult<Vec<SpecCombination>> {
        let values: Vec<JsonValue> = sqlx::query_scalar("SELECT spec_combination FROM products")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_combinations", e))?;

        values
            .iter()
            .map(|v| SpecCombination::from_json(v).map_err(InfraError::from))
            .collect()
    }

    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, location_id = %cmd.location_id),
        err
    )]
    async fn open_account(&self, cmd: OpenAccount) -> InfraResult<OpenedAccount> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("open_account", e))?;

        let product_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(*cmd.product_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("open_account", e))?;
        if !product_exists {
            return Err(DomainError::not_found("product").into());
        }

        let product_id = cmd.product_id;
        let location_id = cmd.location_id;
        let opened = InventoryAccount::open(cmd)?;
        let account = &opened.account;

        let inserted = sqlx::query(
            r#"
            INSERT INTO inventory_accounts (
                id, product_id, location_id, display_name, quantity,
                warning_min, warning_max, cost_price, is_frozen, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (product_id, location_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(*account.product_id.as_uuid())
        .bind(*account.location_id.as_uuid())
        .bind(&account.display_name)
        .bind(account.quantity())
        .bind(account.warning_min)
        .bind(account.warning_max)
        .bind(account.cost_price)
        .bind(account.is_frozen)
        .bind(account.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("open_account", e))?;

        if inserted.is_none() {
            let existing: Uuid = sqlx::query_scalar(
                "SELECT id FROM inventory_accounts WHERE product_id = $1 AND location_id = $2",
            )
            .bind(*product_id.as_uuid())
            .bind(*location_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("open_account", e))?;
            return Err(DomainError::DuplicateAccount {
                account_id: AccountId::from_uuid(existing),
            }
            .into());
        }

        if let Some(entry) = &opened.opening_entry {
            insert_entry(&mut tx, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("open_account", e))?;
        Ok(opened)
    }

    #[instrument(skip(self), err)]
    async fn get_account(&self, id: AccountId) -> InfraResult<Option<InventoryAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM inventory_accounts WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&self, location_id: LocationId) -> InfraResult<Vec<AccountListing>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id, a.product_id, a.location_id, a.display_name, a.quantity,
                a.warning_min, a.warning_max, a.cost_price, a.is_frozen, a.created_at,
                p.name AS product_name,
                p.spec_combination
            FROM inventory_accounts a
            JOIN products p ON p.id = a.product_id
            WHERE a.location_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(*location_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter()
            .map(|row| {
                let account = account_from_row(row)?;
                let stock_level = account.stock_level();
                Ok(AccountListing {
                    account,
                    product_name: row.try_get("product_name").map_err(decode_err)?,
                    spec_combination: combination_from_row(row)?,
                    stock_level,
                })
            })
            .collect()
    }

    #[instrument(skip(self, update), err)]
    async fn update_account(
        &self,
        id: AccountId,
        location_id: LocationId,
        update: &AccountUpdate,
    ) -> InfraResult<InventoryAccount> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?;

        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM inventory_accounts \
             WHERE id = $1 AND location_id = $2 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .bind(*location_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?
        .ok_or_else(|| DomainError::not_found("inventory account"))?;

        let mut account = account_from_row(&row)?;
        account.apply_update(update)?;

        sqlx::query(
            r#"
            UPDATE inventory_accounts
            SET display_name = $2, warning_min = $3, warning_max = $4, cost_price = $5, is_frozen = $6
            WHERE id = $1
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(&account.display_name)
        .bind(account.warning_min)
        .bind(account.warning_max)
        .bind(account.cost_price)
        .bind(account.is_frozen)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?;
        Ok(account)
    }

    #[instrument(
        skip(self, request),
        fields(account_id = %request.account_id, action = %request.action),
        err
    )]
    async fn record_change(&self, request: ChangeRequest) -> InfraResult<LedgerEntry> {
        request.action.signed_change(request.magnitude)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("record_change", e))?;

        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM inventory_accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(*request.account_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_change", e))?
        .ok_or_else(|| DomainError::not_found("inventory account"))?;

        let mut account = account_from_row(&row)?;
        // Rejections return before any write; dropping `tx` rolls back.
        let entry = account.record_change(&request)?;

        if let ChangeSource::Reconciliation { task_id, item_id } = request.source {
            let task_row = sqlx::query(
                "SELECT location_id, status FROM reconciliation_tasks WHERE id = $1 FOR UPDATE",
            )
            .bind(*task_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_change", e))?
            .ok_or_else(|| DomainError::not_found("reconciliation task"))?;

            let task_location: Uuid = task_row.try_get("location_id").map_err(decode_err)?;
            let status: String = task_row.try_get("status").map_err(decode_err)?;
            if LocationId::from_uuid(task_location) != request.location_id {
                return Err(DomainError::not_found("reconciliation task").into());
            }
            if status != "pending" {
                return Err(DomainError::invalid_transition(format!(
                    "task is {status}, expected pending"
                ))
                .into());
            }

            // The entry row must exist before the item can reference it.
            insert_entry(&mut tx, &entry).await?;
            let result = sqlx::query(
                r#"
                UPDATE reconciliation_items
                SET applied_entry = $1
                WHERE id = $2 AND task_id = $3 AND account_id = $4 AND applied_entry IS NULL
                "#,
            )
            .bind(*entry.id.as_uuid())
            .bind(*item_id.as_uuid())
            .bind(*task_id.as_uuid())
            .bind(*request.account_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_change", e))?;
            if result.rows_affected() == 0 {
                return Err(DomainError::invalid_transition(format!(
                    "item {item_id} was already applied"
                ))
                .into());
            }
        } else {
            insert_entry(&mut tx, &entry).await?;
        }

        sqlx::query("UPDATE inventory_accounts SET quantity = $2 WHERE id = $1")
            .bind(*account.id.as_uuid())
            .bind(account.quantity())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_change", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_change", e))?;
        Ok(entry)
    }

    #[instrument(skip(self, filter), err)]
    async fn query_ledger(
        &self,
        location_id: LocationId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> InfraResult<LedgerPage> {
        let account_param = filter.account_id.map(|id| *id.as_uuid());
        let action_param = filter.action.map(|a| a.as_str());
        let spec_param = JsonValue::Object(
            filter
                .spec
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        );

        const WHERE: &str = r#"
            WHERE e.location_id = $1
                AND ($2::uuid IS NULL OR e.account_id = $2)
                AND ($3::text IS NULL OR e.action = $3)
                AND ($4::timestamptz IS NULL OR e.created_at >= $4)
                AND ($5::timestamptz IS NULL OR e.created_at < $5)
                AND p.spec_combination @> $6::jsonb
        "#;
        const FROM: &str = r#"
            FROM ledger_entries e
            JOIN inventory_accounts a ON a.id = e.account_id
            JOIN products p ON p.id = a.product_id
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FROM} {WHERE}"))
            .bind(*location_id.as_uuid())
            .bind(account_param)
            .bind(action_param)
            .bind(filter.from)
            .bind(filter.until)
            .bind(&spec_param)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_ledger", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT
                e.id, e.account_id, e.location_id, e.actor_id, e.action,
                e.change_quantity, e.before_quantity, e.after_quantity, e.remark, e.created_at,
                a.product_id, a.display_name,
                p.name AS product_name, p.spec_combination
            {FROM} {WHERE}
            ORDER BY e.created_at DESC, e.id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(*location_id.as_uuid())
        .bind(account_param)
        .bind(action_param)
        .bind(filter.from)
        .bind(filter.until)
        .bind(&spec_param)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_ledger", e))?;

        let rows = rows
            .iter()
            .map(|row| {
                let product_id: Uuid = row.try_get("product_id").map_err(decode_err)?;
                Ok(LedgerRow {
                    entry: entry_from_row(row)?,
                    product_id: ProductId::from_uuid(product_id),
                    product_name: row.try_get("product_name").map_err(decode_err)?,
                    display_name: row.try_get("display_name").map_err(decode_err)?,
                    spec_combination: combination_from_row(row)?,
                })
            })
            .collect::<InfraResult<Vec<_>>>()?;

        Ok(LedgerPage::new(rows, total.max(0) as u64, pagination))
    }

    #[instrument(skip(self, task), fields(task_id = %task.id), err)]
    async fn insert_task(&self, task: &ReconciliationTask) -> InfraResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_task", e))?;

        sqlx::query(
            r#"
            INSERT INTO reconciliation_tasks (id, location_id, status, remark, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*task.id.as_uuid())
        .bind(*task.location_id.as_uuid())
        .bind(task.status.as_str())
        .bind(&task.remark)
        .bind(*task.created_by.as_uuid())
        .bind(task.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_task", e))?;

        for (position, item) in task.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reconciliation_items (
                    id, task_id, position, account_id, system_quantity, actual_quantity, difference
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(*task.id.as_uuid())
            .bind(position as i32)
            .bind(*item.account_id.as_uuid())
            .bind(item.system_quantity)
            .bind(item.actual_quantity)
            .bind(item.difference)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_task", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_task", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_task(&self, id: ReconciliationTaskId) -> InfraResult<Option<ReconciliationTask>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM reconciliation_tasks WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_task", e))?;

        match row {
            Some(row) => {
                let items = self.load_items(id).await?;
                Ok(Some(task_from_row(&row, items)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn confirm_task(
        &self,
        id: ReconciliationTaskId,
        actor_id: ActorId,
        at: DateTime<Utc>,
    ) -> InfraResult<ReconciliationTask> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("confirm_task", e))?;

        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM reconciliation_tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm_task", e))?
        .ok_or_else(|| DomainError::not_found("reconciliation task"))?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, task_id, account_id, system_quantity, actual_quantity, difference, applied_entry
            FROM reconciliation_items
            WHERE task_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm_task", e))?;
        let items = item_rows.iter().map(item_from_row).collect::<InfraResult<Vec<_>>>()?;

        let mut task = task_from_row(&row, items)?;
        task.mark_confirmed(actor_id, at)?;

        let result = sqlx::query(
            r#"
            UPDATE reconciliation_tasks
            SET status = 'confirmed', confirmed_by = $2, confirmed_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(*id.as_uuid())
        .bind(*actor_id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm_task", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::invalid_transition("task is no longer pending").into());
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("confirm_task", e))?;
        Ok(task)
    }

    #[instrument(skip(self), err)]
    async fn cancel_task(&self, id: ReconciliationTaskId) -> InfraResult<ReconciliationTask> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("cancel_task", e))?;

        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM reconciliation_tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_task", e))?
        .ok_or_else(|| DomainError::not_found("reconciliation task"))?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, task_id, account_id, system_quantity, actual_quantity, difference, applied_entry
            FROM reconciliation_items
            WHERE task_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_task", e))?;
        let items = item_rows.iter().map(item_from_row).collect::<InfraResult<Vec<_>>>()?;

        let mut task = task_from_row(&row, items)?;
        task.cancel()?;

        sqlx::query(
            "UPDATE reconciliation_tasks SET status = 'canceled' WHERE id = $1 AND status = 'pending'",
        )
        .bind(*id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_task", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("cancel_task", e))?;
        Ok(task)
    }
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &LedgerEntry,
) -> InfraResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, account_id, location_id, actor_id, action,
            change_quantity, before_quantity, after_quantity, remark, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.account_id.as_uuid())
    .bind(*entry.location_id.as_uuid())
    .bind(*entry.actor_id.as_uuid())
    .bind(entry.action.as_str())
    .bind(entry.change_quantity)
    .bind(entry.before_quantity)
    .bind(entry.after_quantity)
    .bind(&entry.remark)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_entry", e))?;
    Ok(())
}

fn decode_err(err: sqlx::Error) -> InfraError {
    InfraError::storage(format!("row decode failed: {err}"))
}

fn category_from_row(row: &PgRow) -> InfraResult<SpecCategory> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    Ok(SpecCategory {
        id: SpecCategoryId::from_uuid(id),
        code: row.try_get("code").map_err(decode_err)?,
        name: row.try_get("name").map_err(decode_err)?,
        sort_order: row.try_get("sort_order").map_err(decode_err)?,
        is_active: row.try_get("is_active").map_err(decode_err)?,
    })
}

fn option_from_row(row: &PgRow) -> InfraResult<SpecOption> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let category_id: Uuid = row.try_get("category_id").map_err(decode_err)?;
    Ok(SpecOption {
        id: SpecOptionId::from_uuid(id),
        category_id: SpecCategoryId::from_uuid(category_id),
        value: row.try_get("value").map_err(decode_err)?,
        sort_order: row.try_get("sort_order").map_err(decode_err)?,
        is_active: row.try_get("is_active").map_err(decode_err)?,
    })
}

fn combination_from_row(row: &PgRow) -> InfraResult<SpecCombination> {
    let value: JsonValue = row.try_get("spec_combination").map_err(decode_err)?;
    SpecCombination::from_json(&value)
        .map_err(|e| InfraError::storage(format!("stored combination is invalid: {e}")))
}

fn product_from_row(row: &PgRow) -> InfraResult<Product> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    Ok(Product {
        id: ProductId::from_uuid(id),
        name: row.try_get("name").map_err(decode_err)?,
        spec_combination: combination_from_row(row)?,
        external_code: row.try_get("external_code").map_err(decode_err)?,
        is_active: row.try_get("is_active").map_err(decode_err)?,
        remark: row.try_get("remark").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

fn account_from_row(row: &PgRow) -> InfraResult<InventoryAccount> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let product_id: Uuid = row.try_get("product_id").map_err(decode_err)?;
    let location_id: Uuid = row.try_get("location_id").map_err(decode_err)?;
    Ok(InventoryAccount::restore(
        AccountId::from_uuid(id),
        ProductId::from_uuid(product_id),
        LocationId::from_uuid(location_id),
        row.try_get("display_name").map_err(decode_err)?,
        row.try_get("quantity").map_err(decode_err)?,
        row.try_get("warning_min").map_err(decode_err)?,
        row.try_get("warning_max").map_err(decode_err)?,
        row.try_get("cost_price").map_err(decode_err)?,
        row.try_get("is_frozen").map_err(decode_err)?,
        row.try_get("created_at").map_err(decode_err)?,
    ))
}

fn entry_from_row(row: &PgRow) -> InfraResult<LedgerEntry> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let account_id: Uuid = row.try_get("account_id").map_err(decode_err)?;
    let location_id: Uuid = row.try_get("location_id").map_err(decode_err)?;
    let actor_id: Uuid = row.try_get("actor_id").map_err(decode_err)?;
    let action: String = row.try_get("action").map_err(decode_err)?;
    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(id),
        account_id: AccountId::from_uuid(account_id),
        location_id: LocationId::from_uuid(location_id),
        actor_id: ActorId::from_uuid(actor_id),
        action: action
            .parse()
            .map_err(|e| InfraError::storage(format!("stored action is invalid: {e}")))?,
        change_quantity: row.try_get("change_quantity").map_err(decode_err)?,
        before_quantity: row.try_get("before_quantity").map_err(decode_err)?,
        after_quantity: row.try_get("after_quantity").map_err(decode_err)?,
        remark: row.try_get("remark").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

fn item_from_row(row: &PgRow) -> InfraResult<ReconciliationItem> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let task_id: Uuid = row.try_get("task_id").map_err(decode_err)?;
    let account_id: Uuid = row.try_get("account_id").map_err(decode_err)?;
    let applied: Option<Uuid> = row.try_get("applied_entry").map_err(decode_err)?;
    Ok(ReconciliationItem {
        id: ReconciliationItemId::from_uuid(id),
        task_id: ReconciliationTaskId::from_uuid(task_id),
        account_id: AccountId::from_uuid(account_id),
        system_quantity: row.try_get("system_quantity").map_err(decode_err)?,
        actual_quantity: row.try_get("actual_quantity").map_err(decode_err)?,
        difference: row.try_get("difference").map_err(decode_err)?,
        applied_entry: applied.map(LedgerEntryId::from_uuid),
    })
}

fn task_from_row(row: &PgRow, items: Vec<ReconciliationItem>) -> InfraResult<ReconciliationTask> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let location_id: Uuid = row.try_get("location_id").map_err(decode_err)?;
    let created_by: Uuid = row.try_get("created_by").map_err(decode_err)?;
    let confirmed_by: Option<Uuid> = row.try_get("confirmed_by").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    Ok(ReconciliationTask {
        id: ReconciliationTaskId::from_uuid(id),
        location_id: LocationId::from_uuid(location_id),
        status: status
            .parse()
            .map_err(|e| InfraError::storage(format!("stored status is invalid: {e}")))?,
        remark: row.try_get("remark").map_err(decode_err)?,
        created_by: ActorId::from_uuid(created_by),
        created_at: row.try_get("created_at").map_err(decode_err)?,
        confirmed_by: confirmed_by.map(ActorId::from_uuid),
        confirmed_at: row.try_get("confirmed_at").map_err(decode_err)?,
        items,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> InfraError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::duplicate_code(msg).into(),
                Some("23503") => DomainError::not_found(msg).into(),
                _ => InfraError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            InfraError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => InfraError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
