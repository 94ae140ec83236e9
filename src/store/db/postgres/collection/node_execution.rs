use std::str::FromStr;

use sea_query::{Alias as SeaAlias, ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, PageData,
        data::{self, NodeRunStatus},
        db::postgres::{DbInit, DbRow},
        query,
    },
};

use super::{DbConnection, decode_err, into_query, map_db_err};

pub struct NodeExecutionCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "node_executions"]
enum CollectionIden {
    Table,

    Id,
    ExecutionId,
    NodeId,
    Status,
    RetryAttempt,
    InputSnapshot,
    OutputSnapshot,
    ErrorMessage,
    StartedAt,
    CompletedAt,
    Timestamp,
}

const COLUMNS: [CollectionIden; 11] = [
    CollectionIden::Id,
    CollectionIden::ExecutionId,
    CollectionIden::NodeId,
    CollectionIden::Status,
    CollectionIden::RetryAttempt,
    CollectionIden::InputSnapshot,
    CollectionIden::OutputSnapshot,
    CollectionIden::ErrorMessage,
    CollectionIden::StartedAt,
    CollectionIden::CompletedAt,
    CollectionIden::Timestamp,
];

impl DbCollection for NodeExecutionCollection {
    type Item = data::FlowNodeExecution;

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
                data.execution_id.into(),
                data.node_id.into(),
                data.status.as_ref().into(),
                (data.retry_attempt as i32).into(),
                data.input_snapshot.to_string().into(),
                data.output_snapshot.to_string().into(),
                data.error_message.into(),
                data.started_at.into(),
                data.completed_at.into(),
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
                (CollectionIden::RetryAttempt, (model.retry_attempt as i32).into()),
                (CollectionIden::InputSnapshot, model.input_snapshot.to_string().into()),
                (CollectionIden::OutputSnapshot, model.output_snapshot.to_string().into()),
                (CollectionIden::ErrorMessage, model.error_message.into()),
                (CollectionIden::StartedAt, model.started_at.into()),
                (CollectionIden::CompletedAt, model.completed_at.into()),
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

impl DbRow for data::FlowNodeExecution {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        let status: String = row.get("status");
        let input_snapshot: String = row.get("input_snapshot");
        let output_snapshot: String = row.get("output_snapshot");
        Ok(Self {
            id: row.get("id"),
            execution_id: row.get("execution_id"),
            node_id: row.get("node_id"),
            status: NodeRunStatus::from_str(&status).map_err(decode_err)?,
            retry_attempt: row.get::<i32, _>("retry_attempt") as u32,
            input_snapshot: serde_json::from_str(&input_snapshot).map_err(decode_err)?,
            output_snapshot: serde_json::from_str(&output_snapshot).map_err(decode_err)?,
            error_message: row.get("error_message"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            timestamp: row.get("timestamp"),
        })
    }
}

impl DbInit for NodeExecutionCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::ExecutionId).string().not_null())
                .col(ColumnDef::new(CollectionIden::NodeId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Status).string().not_null())
                .col(ColumnDef::new(CollectionIden::RetryAttempt).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::InputSnapshot).text().not_null())
                .col(ColumnDef::new(CollectionIden::OutputSnapshot).text().not_null())
                .col(ColumnDef::new(CollectionIden::ErrorMessage).text())
                .col(ColumnDef::new(CollectionIden::StartedAt).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::CompletedAt).big_integer())
                .col(ColumnDef::new(CollectionIden::Timestamp).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_node_executions_execution_id")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::ExecutionId)
                .build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl NodeExecutionCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
