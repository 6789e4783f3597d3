use sqlx::PgPool;

use crate::models::{CreateInvestmentDecision, InvestmentDecision};

pub async fn insert_decision(pool: &PgPool, d: &CreateInvestmentDecision) -> Result<InvestmentDecision, sqlx::Error> {
    sqlx::query_as::<_, InvestmentDecision>(
        r#"
        INSERT INTO investment_decisions
            (asset_type, symbol, decision_type, decision_date, price, quantity,
             dcf_valuation, macro_adjustment, confidence, reasoning)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, asset_type, symbol, decision_type, decision_date, price, quantity,
                  dcf_valuation, macro_adjustment, confidence, reasoning
        "#,
    )
    .bind(&d.asset_type)
    .bind(&d.symbol)
    .bind(d.decision_type.as_str())
    .bind(d.decision_date)
    .bind(d.price)
    .bind(d.quantity)
    .bind(d.dcf_valuation)
    .bind(d.macro_adjustment)
    .bind(d.confidence)
    .bind(&d.reasoning)
    .fetch_one(pool)
    .await
}

pub async fn list_decisions(pool: &PgPool) -> Result<Vec<InvestmentDecision>, sqlx::Error> {
    sqlx::query_as::<_, InvestmentDecision>(
        r#"
        SELECT id, asset_type, symbol, decision_type, decision_date, price, quantity,
               dcf_valuation, macro_adjustment, confidence, reasoning
        FROM investment_decisions
        ORDER BY decision_date ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_decision(pool: &PgPool, id: i64) -> Result<Option<InvestmentDecision>, sqlx::Error> {
    sqlx::query_as::<_, InvestmentDecision>(
        r#"
        SELECT id, asset_type, symbol, decision_type, decision_date, price, quantity,
               dcf_valuation, macro_adjustment, confidence, reasoning
        FROM investment_decisions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
