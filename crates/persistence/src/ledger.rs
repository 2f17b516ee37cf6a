//! Trade ledger - one row per order, per the external schema in §6.

use signal_core::{Error, NewTrade, OrderStatus, OrderType, PositionSide, Result, Side};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.to_string_lossy()))
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                position_side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                status TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                executed_qty REAL NOT NULL DEFAULT 0,
                avg_price REAL NOT NULL DEFAULT 0,
                stop_price REAL,
                take_profit_price REAL,
                stop_loss_price REAL,
                commission REAL NOT NULL DEFAULT 0,
                commission_asset TEXT,
                realized_pnl REAL NOT NULL DEFAULT 0,
                signal_strength REAL NOT NULL,
                signal_reason TEXT NOT NULL,
                indicators TEXT NOT NULL DEFAULT '{}',
                executed_at TIMESTAMP,
                closed_at TIMESTAMP,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades (symbol);
            CREATE INDEX IF NOT EXISTS idx_trades_status ON trades (status);
            CREATE INDEX IF NOT EXISTS idx_trades_created_at ON trades (created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Insert a new row for a just-placed order (status=NEW).
    pub async fn insert_new(&self, trade: &NewTrade) -> Result<i64> {
        let side = format!("{:?}", trade.side).to_uppercase();
        let position_side = format!("{:?}", trade.position_side).to_uppercase();
        let order_type = order_type_str(trade.order_type);

        let result = sqlx::query(
            r#"
            INSERT INTO trades (
                order_id, symbol, side, position_side, order_type, status,
                quantity, price, stop_loss_price, take_profit_price,
                signal_strength, signal_reason, indicators
            ) VALUES (?, ?, ?, ?, ?, 'NEW', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.order_id)
        .bind(&trade.symbol)
        .bind(side)
        .bind(position_side)
        .bind(order_type)
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.stop_loss_price)
        .bind(trade.take_profit_price)
        .bind(trade.signal_strength)
        .bind(&trade.signal_reason)
        .bind(&trade.indicators)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Mark an order filled with its execution details.
    pub async fn mark_filled(
        &self,
        order_id: &str,
        executed_qty: f64,
        avg_price: f64,
        commission: f64,
        commission_asset: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades SET
                status = 'FILLED',
                executed_qty = ?,
                avg_price = ?,
                commission = ?,
                commission_asset = ?,
                executed_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = ?
            "#,
        )
        .bind(executed_qty)
        .bind(avg_price)
        .bind(commission)
        .bind(commission_asset)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Record a position close against its originating order row.
    pub async fn mark_closed(&self, order_id: &str, realized_pnl: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades SET
                status = 'FILLED',
                realized_pnl = ?,
                closed_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = ?
            "#,
        )
        .bind(realized_pnl)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn mark_rejected(&self, order_id: &str) -> Result<()> {
        sqlx::query("UPDATE trades SET status = 'REJECTED', updated_at = CURRENT_TIMESTAMP WHERE order_id = ?")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn count_by_status(&self, status: OrderStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM trades WHERE status = ?")
            .bind(order_status_str(status))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(row.get::<i64, _>("c"))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn side_from_str(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn position_side_from_str(s: &str) -> Option<PositionSide> {
        match s {
            "LONG" => Some(PositionSide::Long),
            "SHORT" => Some(PositionSide::Short),
            _ => None,
        }
    }
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Limit => "LIMIT",
        OrderType::Market => "MARKET",
        OrderType::StopMarket => "STOP_MARKET",
        OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
    }
}

fn order_status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::New => "NEW",
        OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
        OrderStatus::Filled => "FILLED",
        OrderStatus::Canceled => "CANCELED",
        OrderStatus::Expired => "EXPIRED",
        OrderStatus::Rejected => "REJECTED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{OrderType, PositionSide, Side};

    #[tokio::test]
    async fn insert_then_mark_filled_round_trips() {
        let ledger = Ledger::connect_in_memory().await.unwrap();
        let new_trade = NewTrade {
            order_id: "order-1".into(),
            symbol: "BTC-USDT".into(),
            side: Side::Buy,
            position_side: PositionSide::Long,
            order_type: OrderType::Market,
            quantity: 0.00333,
            price: 30000.0,
            stop_loss_price: Some(29400.0),
            take_profit_price: Some(30900.0),
            signal_strength: 80.0,
            signal_reason: "rsi_oversold".into(),
            indicators: "{}".into(),
        };

        let row_id = ledger.insert_new(&new_trade).await.unwrap();
        assert!(row_id > 0);

        ledger
            .mark_filled("order-1", 0.00333, 30001.0, 0.01, "USDT")
            .await
            .unwrap();

        let count = ledger.count_by_status(OrderStatus::Filled).await.unwrap();
        assert_eq!(count, 1);
    }
}
