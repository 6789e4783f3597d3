use crate::errors::AppError;
use crate::models::{CommodityForecast, CommodityParameters, DcfBaseline, DcfValuation};

/// Largest price move the supply/demand model will forecast in one period.
const MAX_PRICE_CHANGE: f64 = 0.5;

/// Discounted cash flow value per share.
///
/// Cash flow grows at `growth_rate` for `projection_years`, then a Gordon
/// terminal value at `terminal_growth_rate`; everything is discounted at
/// `discount_rate`.
pub fn dcf_valuation(symbol: &str, params: &DcfBaseline) -> Result<DcfValuation, AppError> {
    let r = params.discount_rate;
    let g = params.growth_rate;
    let tg = params.terminal_growth_rate;

    if ![r, g, tg, params.free_cash_flow, params.net_debt, params.shares_outstanding]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(AppError::Invariant(format!("{}: non-finite DCF input", symbol)));
    }
    if r <= tg {
        return Err(AppError::DataQuality(format!(
            "{}: discount rate {:.4} must exceed terminal growth {:.4}",
            symbol, r, tg
        )));
    }
    if params.shares_outstanding <= 0.0 || params.projection_years == 0 {
        return Err(AppError::DataQuality(format!(
            "{}: needs positive shares outstanding and projection years",
            symbol
        )));
    }

    let years = params.projection_years as i32;
    let projected_cash_flows: Vec<f64> = (1..=years).map(|t| params.free_cash_flow * (1.0 + g).powi(t)).collect();
    let pv_cash_flows: f64 = projected_cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + r).powi(i as i32 + 1))
        .sum();

    let final_cash_flow = projected_cash_flows.last().copied().unwrap_or(params.free_cash_flow);
    let terminal_value = final_cash_flow * (1.0 + tg) / (r - tg);
    let enterprise_value = pv_cash_flows + terminal_value / (1.0 + r).powi(years);
    let equity_value = enterprise_value - params.net_debt;

    Ok(DcfValuation {
        symbol: symbol.to_string(),
        projected_cash_flows,
        terminal_value,
        enterprise_value,
        equity_value,
        per_share_value: equity_value / params.shares_outstanding,
    })
}

/// Next-period price from the supply/demand balance.
///
/// A deficit raises the price in proportion to 1/|elasticity|; inventory
/// cover dampens the move, and the seasonal factor scales the result.
pub fn commodity_forecast(commodity: &str, params: &CommodityParameters) -> Result<CommodityForecast, AppError> {
    let projected_supply = params.supply * (1.0 + params.production_growth);
    let projected_demand = params.demand * (1.0 + params.consumption_growth);

    if !(projected_supply > 0.0 && projected_demand > 0.0) {
        return Err(AppError::DataQuality(format!(
            "{}: supply and demand must stay positive",
            commodity
        )));
    }
    if params.price_elasticity == 0.0 || !params.price_elasticity.is_finite() {
        return Err(AppError::DataQuality(format!("{}: price elasticity must be non-zero", commodity)));
    }

    let balance = (projected_demand - projected_supply) / projected_supply;
    let inventory_cover = (params.inventory / projected_demand).max(0.0);
    let price_change = (balance / params.price_elasticity.abs() / (1.0 + inventory_cover))
        .clamp(-MAX_PRICE_CHANGE, MAX_PRICE_CHANGE);
    let predicted_price = params.current_price * (1.0 + price_change) * params.seasonal_factor;

    if !predicted_price.is_finite() {
        return Err(AppError::Invariant(format!("{}: non-finite price forecast", commodity)));
    }

    Ok(CommodityForecast {
        commodity: commodity.to_string(),
        projected_supply,
        projected_demand,
        balance,
        current_price: params.current_price,
        price_change,
        predicted_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dcf_flat_growth() {
        let params = DcfBaseline {
            discount_rate: 0.10,
            growth_rate: 0.0,
            terminal_growth_rate: 0.0,
            free_cash_flow: 100.0,
            net_debt: 0.0,
            shares_outstanding: 10.0,
            projection_years: 5,
        };
        let valuation = dcf_valuation("TEST", &params).unwrap();
        // a flat perpetuity of 100 at 10% is worth 1000
        assert!((valuation.enterprise_value - 1000.0).abs() < 1e-9);
        assert!((valuation.per_share_value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_higher_discount_rate_lowers_value() {
        let base = DcfBaseline::default();
        let mut tighter = base.clone();
        tighter.discount_rate = 0.12;
        let v1 = dcf_valuation("AAPL", &base).unwrap().per_share_value;
        let v2 = dcf_valuation("AAPL", &tighter).unwrap().per_share_value;
        assert!(v2 < v1);
    }

    #[test]
    fn test_dcf_rejects_terminal_growth_above_discount() {
        let mut params = DcfBaseline::default();
        params.terminal_growth_rate = 0.12;
        assert!(matches!(dcf_valuation("X", &params), Err(AppError::DataQuality(_))));
    }

    #[test]
    fn test_deficit_raises_price() {
        let params = CommodityParameters {
            supply: 900.0,
            demand: 1000.0,
            production_growth: 0.0,
            consumption_growth: 0.0,
            ..CommodityParameters::default()
        };
        let forecast = commodity_forecast("oil", &params).unwrap();
        assert!(forecast.balance > 0.0);
        assert!(forecast.predicted_price > params.current_price);
    }

    #[test]
    fn test_price_change_is_bounded() {
        let params = CommodityParameters {
            supply: 100.0,
            demand: 10_000.0,
            inventory: 0.0,
            ..CommodityParameters::default()
        };
        let forecast = commodity_forecast("copper", &params).unwrap();
        assert_eq!(forecast.price_change, MAX_PRICE_CHANGE);
    }
}
