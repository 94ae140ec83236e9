use std::str::FromStr;

use sea_query::{Alias as SeaAlias, ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, PageData,
        data::{self, ExecutionStatus},
        db::postgres::{DbInit, DbRow},
        query,
    },
};

use super::{DbConnection, decode_err, into_query, map_db_err};

#[derive(Debug)]
pub struct ExecutionCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "executions"]
enum CollectionIden {
    Table,

    Id,
    FlowId,
    TenantId,
    Status,
    TriggerData,
    ContextId,
    ContextType,
    CurrentNodeId,
    ErrorMessage,
    RetryOf,
    StartedAt,
    CompletedAt,
    DurationMs,
    Timestamp,
}

const COLUMNS: [CollectionIden; 14] = [
    CollectionIden::Id,
    CollectionIden::FlowId,
    CollectionIden::TenantId,
    CollectionIden::Status,
    CollectionIden::TriggerData,
    CollectionIden::ContextId,
    CollectionIden::ContextType,
    CollectionIden::CurrentNodeId,
    CollectionIden::ErrorMessage,
    CollectionIden::RetryOf,
    CollectionIden::StartedAt,
    CollectionIden::CompletedAt,
    CollectionIden::DurationMs,
    CollectionIden::Timestamp,
];

impl DbCollection for ExecutionCollection {
    type Item = data::FlowExecution;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .expr(SeaFunc::count(SeaExpr::col(CollectionIden::Id)))
            .and_where(SeaExpr::col(CollectionIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        let (sql, values) =
            SeaQuery::select().from(CollectionIden::Table).columns(COLUMNS).and_where(SeaExpr::col(CollectionIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(&sql, values).map_err(map_db_err)?;
        Self::Item::from_row(&row).map_err(map_db_err)
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        let filter = into_query(q);

        let mut count_query = SeaQuery::select();
        count_query.from(CollectionIden::Table).expr(SeaFunc::count(SeaExpr::col(SeaAlias::new("id"))));

        let mut query = SeaQuery::select();
        query.columns(COLUMNS).from(CollectionIden::Table);

        if !filter.is_empty() {
            count_query.cond_where(filter.clone());
            query.cond_where(filter);
        }

        for (order, rev) in q.order_by().iter() {
            query.order_by(
                SeaAlias::new(order),
                if *rev {
                    SeaOrder::Desc
                } else {
                    SeaOrder::Asc
                },
            );
        }
        let (sql, values) = query.limit(q.limit() as u64).offset(q.offset() as u64).build_sqlx(PostgresQueryBuilder);

        let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
        let count = self.conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
        let rows = self.conn.query(&sql, values).map_err(map_db_err)?.iter().map(Self::Item::from_row).collect::<std::result::Result<Vec<_>, _>>().map_err(map_db_err)?;

        Ok(PageData {
            count,
            page_size: q.limit(),
            page_num: q.offset() / q.limit() + 1,
            page_count: count.div_ceil(q.limit()),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let data = data.clone();
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns(COLUMNS)
            .values([
                data.id.into(),
                data.flow_id.into(),
                data.tenant_id.into(),
                data.status.as_ref().into(),
                data.trigger_data.to_string().into(),
                data.context_id.into(),
                data.context_type.into(),
                data.current_node_id.into(),
                data.error_message.into(),
                data.retry_of.into(),
                data.started_at.into(),
                data.completed_at.into(),
                data.duration_ms.into(),
                data.timestamp.into(),
            ])
            .map_err(map_db_err)?
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = SeaQuery::update()
            .table(CollectionIden::Table)
            .values([
                (CollectionIden::Status, model.status.as_ref().into()),
                (CollectionIden::CurrentNodeId, model.current_node_id.into()),
                (CollectionIden::ErrorMessage, model.error_message.into()),
                (CollectionIden::StartedAt, model.started_at.into()),
                (CollectionIden::CompletedAt, model.completed_at.into()),
                (CollectionIden::DurationMs, model.duration_ms.into()),
                (CollectionIden::Timestamp, model.timestamp.into()),
            ])
            .and_where(SeaExpr::col(CollectionIden::Id).eq(data.id()))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) =
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::FlowExecution {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        let status: String = row.get("status");
        let trigger_data: String = row.get("trigger_data");
        Ok(Self {
            id: row.get("id"),
            flow_id: row.get("flow_id"),
            tenant_id: row.get("tenant_id"),
            status: ExecutionStatus::from_str(&status).map_err(decode_err)?,
            trigger_data: serde_json::from_str(&trigger_data).map_err(decode_err)?,
            context_id: row.get("context_id"),
            context_type: row.get("context_type"),
            current_node_id: row.get("current_node_id"),
            error_message: row.get("error_message"),
            retry_of: row.get("retry_of"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            duration_ms: row.get("duration_ms"),
            timestamp: row.get("timestamp"),
        })
    }
}

impl DbInit for ExecutionCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::FlowId).string().not_null())
                .col(ColumnDef::new(CollectionIden::TenantId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Status).string().not_null())
                .col(ColumnDef::new(CollectionIden::TriggerData).text().not_null())
                .col(ColumnDef::new(CollectionIden::ContextId).string())
                .col(ColumnDef::new(CollectionIden::ContextType).string())
                .col(ColumnDef::new(CollectionIden::CurrentNodeId).string())
                .col(ColumnDef::new(CollectionIden::ErrorMessage).text())
                .col(ColumnDef::new(CollectionIden::RetryOf).string())
                .col(ColumnDef::new(CollectionIden::StartedAt).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::CompletedAt).big_integer())
                .col(ColumnDef::new(CollectionIden::DurationMs).big_integer())
                .col(ColumnDef::new(CollectionIden::Timestamp).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_executions_status").if_not_exists().table(CollectionIden::Table).col(CollectionIden::Status).build(PostgresQueryBuilder),
            Index::create().name("idx_executions_flow_id").if_not_exists().table(CollectionIden::Table).col(CollectionIden::FlowId).build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl ExecutionCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
