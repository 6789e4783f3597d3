/// Model integration and return attribution tests.
///
/// Event impacts feed factor resolution, adjusted parameters feed valuation,
/// and decisions are attributed to factor moves with a balancing residual.

// ---------------------------------------------------------------------------
// Model integration
// ---------------------------------------------------------------------------

#[cfg(test)]
mod model_integration {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use macrolens::config::{FactorSource, ImpactFactorConfig};
    use macrolens::models::{
        DcfBaseline, EventImpact, EventSentiment, ImpactType, ModelParameters, ScoredArticle, TimeHorizon,
    };
    use macrolens::services::integration_service::{apply_factors, resolve_factor, FactorEvidence};
    use macrolens::services::quantitative_service::{rolling_impacts, AggregationWeights};
    use macrolens::services::valuation_service::dcf_valuation;

    fn rate_factor(weight: f64) -> ImpactFactorConfig {
        ImpactFactorConfig {
            name: "interest_rates".to_string(),
            target: "discount_rate".to_string(),
            weight,
            source: FactorSource::Indicators,
            indicator: None,
            allow_negative: false,
        }
    }

    fn baseline() -> DcfBaseline {
        DcfBaseline {
            discount_rate: 0.08,
            terminal_growth_rate: 0.02,
            ..DcfBaseline::default()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_rate_hike_evidence_raises_discount_rate() {
        let impacts = vec![EventImpact::new(
            11,
            "interest_rates",
            ImpactType::Direct,
            0.5,
            0.8,
            TimeHorizon::Short,
        )];
        let evidence = FactorEvidence {
            impacts: &impacts,
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        let resolved = resolve_factor(&rate_factor(0.4), &evidence).unwrap();
        assert!((resolved.impact - 0.5).abs() < 1e-12);

        let (adjusted, adjustments) = apply_factors("AAPL", &baseline(), &[resolved], date());
        assert!((adjusted.discount_rate - 0.096).abs() < 1e-12);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].factor_name, "discount_rate");
        assert_eq!(adjustments[0].event_id, Some(11));
        assert_eq!(adjusted.get("growth_rate"), baseline().get("growth_rate"));
    }

    #[test]
    fn test_higher_discount_rate_lowers_value() {
        let impacts = vec![EventImpact::new(3, "interest_rates", ImpactType::Direct, 0.5, 0.8, TimeHorizon::Medium)];
        let evidence = FactorEvidence {
            impacts: &impacts,
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        let resolved = resolve_factor(&rate_factor(0.4), &evidence).unwrap();
        let (adjusted, _) = apply_factors("AAPL", &baseline(), &[resolved], date());

        let before = dcf_valuation("AAPL", &baseline()).unwrap();
        let after = dcf_valuation("AAPL", &adjusted).unwrap();
        assert!(after.per_share_value < before.per_share_value);
    }

    #[test]
    fn test_extreme_evidence_never_flips_sign() {
        let impacts = vec![EventImpact::new(5, "interest_rates", ImpactType::Direct, -250.0, 1.0, TimeHorizon::Long)];
        let evidence = FactorEvidence {
            impacts: &impacts,
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        let resolved = resolve_factor(&rate_factor(0.9), &evidence).unwrap();
        let (adjusted, _) = apply_factors("AAPL", &baseline(), &[resolved], date());
        assert!(adjusted.discount_rate > 0.0);
        assert!((adjusted.discount_rate - 0.008).abs() < 1e-12);
    }

    fn sentiment_factor() -> ImpactFactorConfig {
        ImpactFactorConfig {
            name: "market_sentiment".to_string(),
            target: "discount_rate".to_string(),
            weight: 0.2,
            source: FactorSource::Analysis,
            indicator: None,
            allow_negative: false,
        }
    }

    fn scored_article(id: i64, day: u32, polarity: f64) -> ScoredArticle {
        ScoredArticle {
            article_id: id,
            published_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            category_scores: BTreeMap::from([("monetary_policy".to_string(), 1.6)]),
            polarity,
            confidence: 0.8,
        }
    }

    fn discount_after(articles: &[ScoredArticle], events: &[EventSentiment]) -> f64 {
        let weights = AggregationWeights::new(0.4, 0.6, 1.0).unwrap();
        let windows = rolling_impacts(articles, date(), 7, 4, 0.5, &weights);
        let evidence = FactorEvidence {
            impacts: &[],
            events,
            category_impacts: &windows,
            subject_keywords: &[],
        };
        let resolved = resolve_factor(&sentiment_factor(), &evidence).unwrap();
        let (adjusted, _) = apply_factors("AAPL", &baseline(), &[resolved], date());
        adjusted.discount_rate
    }

    #[test]
    fn test_aggregated_window_drives_sentiment_adjustment() {
        let events = vec![EventSentiment {
            event_id: 4,
            name: "Monetary Policy: 加息".to_string(),
            category: "monetary_policy".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 28).unwrap(),
            importance: 3,
            avg_polarity: Some(0.0),
            article_count: 15,
        }];
        let calm: Vec<_> = (1..=3).map(|id| scored_article(id, 28, 0.1)).collect();
        let alarmed: Vec<_> = (1..=3).map(|id| scored_article(id, 28, -0.8)).collect();

        let calm_rate = discount_after(&calm, &events);
        let alarmed_rate = discount_after(&alarmed, &events);
        assert!(calm_rate > baseline().discount_rate);
        assert!(alarmed_rate < calm_rate);

        // without events the newest scored window resolves the factor alone
        assert!((discount_after(&alarmed, &[]) - alarmed_rate).abs() < 1e-12);
    }

    #[test]
    fn test_no_evidence_leaves_baseline() {
        let evidence = FactorEvidence {
            impacts: &[],
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        assert!(resolve_factor(&rate_factor(0.4), &evidence).is_none());
        let (adjusted, adjustments) = apply_factors("AAPL", &baseline(), &[], date());
        assert_eq!(adjusted, baseline());
        assert!(adjustments.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[cfg(test)]
mod attribution {
    use chrono::{Duration, TimeZone, Utc};
    use macrolens::models::{DecisionType, FitStatus, InvestmentDecision, UNEXPLAINED};
    use macrolens::services::attribution_service::{
        compute_returns, decompose, exposures_from_fit, fit_factor_betas, verify_balance, BALANCE_TOLERANCE,
    };

    const RATES: [f64; 8] = [0.01, -0.02, 0.015, 0.0, -0.01, 0.02, 0.005, -0.005];
    const SENTIMENT: [f64; 8] = [0.3, 0.1, -0.2, 0.05, 0.0, -0.1, 0.2, 0.15];

    fn asset_returns() -> Vec<f64> {
        RATES
            .iter()
            .zip(SENTIMENT.iter())
            .map(|(r, s)| 0.001 + 1.5 * r - 0.5 * s)
            .collect()
    }

    fn decision(decision_type: &str) -> InvestmentDecision {
        InvestmentDecision {
            id: 42,
            asset_type: "stock".to_string(),
            symbol: "AAPL".to_string(),
            decision_type: decision_type.to_string(),
            decision_date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            price: 100.0,
            quantity: 10.0,
            dcf_valuation: Some(120.0),
            macro_adjustment: None,
            confidence: 0.7,
            reasoning: None,
        }
    }

    fn names() -> Vec<String> {
        vec!["interest_rates".to_string(), "news_sentiment".to_string()]
    }

    #[test]
    fn test_ols_recovers_exposures() {
        let betas = fit_factor_betas(&asset_returns(), &[RATES.to_vec(), SENTIMENT.to_vec()]).unwrap();
        assert!((betas[0] - 1.5).abs() < 1e-8);
        assert!((betas[1] + 0.5).abs() < 1e-8);
    }

    #[test]
    fn test_buy_contributions_balance_excess_return() {
        let buy = decision("buy");
        let evaluated = buy.decision_date + Duration::days(180);
        let metrics = compute_returns(&buy, 112.0, evaluated, 0.10).unwrap();
        assert!((metrics.actual_return - 0.12).abs() < 1e-12);
        assert_eq!(metrics.holding_period_days, 180);

        let betas = fit_factor_betas(&asset_returns(), &[RATES.to_vec(), SENTIMENT.to_vec()]).unwrap();
        let exposures = exposures_from_fit(&names(), &betas, &[0.02, -0.1], DecisionType::Buy);
        let result = decompose(buy.id, evaluated, &metrics, &names(), Some(&exposures)).unwrap();

        assert_eq!(result.fit_status, FitStatus::Fitted);
        let total: f64 = result.contributions.values().sum();
        assert!((total - result.excess_return()).abs() <= BALANCE_TOLERANCE);
        assert!((result.contributions["interest_rates"] - 0.03).abs() < 1e-6);
        assert!((result.contributions["news_sentiment"] - 0.05).abs() < 1e-6);
        assert!(verify_balance(&result).is_ok());
    }

    #[test]
    fn test_sell_profits_from_falling_price() {
        let buy = decision("buy");
        let sell = decision("sell");
        let evaluated = sell.decision_date + Duration::days(90);
        let buy_metrics = compute_returns(&buy, 90.0, evaluated, 0.10).unwrap();
        let sell_metrics = compute_returns(&sell, 90.0, evaluated, 0.10).unwrap();
        assert!(buy_metrics.actual_return < 0.0);
        assert!((sell_metrics.actual_return + buy_metrics.actual_return).abs() < 1e-12);

        let betas = [1.5, -0.5];
        let buy_exposures = exposures_from_fit(&names(), &betas, &[0.02, -0.1], DecisionType::Buy);
        let sell_exposures = exposures_from_fit(&names(), &betas, &[0.02, -0.1], DecisionType::Sell);
        assert_eq!(buy_exposures[0].beta, -sell_exposures[0].beta);

        let result = decompose(sell.id, evaluated, &sell_metrics, &names(), Some(&sell_exposures)).unwrap();
        let total: f64 = result.contributions.values().sum();
        assert!((total - result.excess_return()).abs() <= BALANCE_TOLERANCE);
    }

    #[test]
    fn test_without_fit_excess_lands_in_residual() {
        let buy = decision("buy");
        let evaluated = buy.decision_date + Duration::days(30);
        let metrics = compute_returns(&buy, 101.0, evaluated, 0.10).unwrap();
        let too_short = fit_factor_betas(&[0.01, 0.02], &[vec![0.1, 0.2]]);
        assert!(too_short.is_none());

        let result = decompose(buy.id, evaluated, &metrics, &names(), None).unwrap();
        assert_eq!(result.fit_status, FitStatus::Insufficient);
        assert_eq!(result.contributions["interest_rates"], 0.0);
        assert!((result.contributions[UNEXPLAINED] - result.excess_return()).abs() <= BALANCE_TOLERANCE);
    }

    #[test]
    fn test_bad_entry_price_is_an_invariant_error() {
        let mut bad = decision("buy");
        bad.price = 0.0;
        assert!(compute_returns(&bad, 100.0, Utc::now(), 0.10).is_err());
    }
}
