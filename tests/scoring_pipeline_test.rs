/// Scoring flow tests: keyword categorization, sentiment, and per-category
/// aggregation chained the way the pipeline runs them, without a database.

// ---------------------------------------------------------------------------
// Keyword categorization
// ---------------------------------------------------------------------------

#[cfg(test)]
mod keyword_categorization {
    use std::collections::BTreeMap;

    use macrolens::services::keyword_service::KeywordCategorizer;

    fn categorizer() -> KeywordCategorizer {
        let categories = BTreeMap::from([
            (
                "monetary_policy".to_string(),
                BTreeMap::from([
                    ("央行".to_string(), 0.7),
                    ("加息".to_string(), 0.9),
                    ("interest rate".to_string(), 0.8),
                ]),
            ),
            (
                "trade_policy".to_string(),
                BTreeMap::from([("关税".to_string(), 0.9), ("tariff".to_string(), 0.8)]),
            ),
        ]);
        KeywordCategorizer::new(&categories).unwrap()
    }

    #[test]
    fn test_central_bank_hike_scores_both_keywords() {
        let result = categorizer().categorize(1, "央行宣布加息", "");
        assert!((result.score("monetary_policy") - 1.6).abs() < 1e-12);
        assert_eq!(result.score("trade_policy"), 0.0);
        assert_eq!(result.primary_category(), Some("monetary_policy"));
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn test_same_input_same_result() {
        let c = categorizer();
        let text = "The central bank raised the interest rate; new tariff talks stall. 央行 关税";
        assert_eq!(c.categorize_text(9, text), c.categorize_text(9, text));
    }

    #[test]
    fn test_adding_an_occurrence_never_lowers_a_score() {
        let c = categorizer();
        let base = c.categorize_text(1, "央行表示将关注关税影响");
        let more = c.categorize_text(1, "央行表示将关注关税影响，央行再次强调");
        for (category, score) in &base.category_scores {
            assert!(more.score(category) >= *score);
        }
        assert!(more.score("monetary_policy") > base.score("monetary_policy"));
    }

    #[test]
    fn test_every_category_reported() {
        let result = categorizer().categorize_text(3, "nothing relevant here");
        assert_eq!(result.category_scores.len(), 2);
        assert!(!result.has_matches());
        assert_eq!(result.primary_category(), None);
    }
}

// ---------------------------------------------------------------------------
// Categorize, score, aggregate
// ---------------------------------------------------------------------------

#[cfg(test)]
mod end_to_end_scoring {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use macrolens::config::SentimentMethod;
    use macrolens::models::{AggregateStatus, ScoredArticle};
    use macrolens::services::keyword_service::KeywordCategorizer;
    use macrolens::services::quantitative_service::{aggregate_window, AggregationWeights};
    use macrolens::services::sentiment_service::SentimentScorer;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    const HEADLINE: &str = "央行宣布加息应对通胀危机";
    const BODY: &str = "市场担忧经济衰退，股市暴跌，信贷急剧收紧，企业违约增加，消费疲软，就业前景萎缩，投资者普遍担忧危机蔓延。";

    fn scored(id: i64, title: &str, content: &str, published: NaiveDate) -> ScoredArticle {
        let categories = BTreeMap::from([(
            "monetary_policy".to_string(),
            BTreeMap::from([("央行".to_string(), 0.7), ("加息".to_string(), 0.9)]),
        )]);
        let categorizer = KeywordCategorizer::new(&categories).unwrap();
        let scorer = SentimentScorer::new(SentimentMethod::Lexicon, "zh", 40);

        let keywords = categorizer.categorize(id, title, content);
        let sentiment = scorer.score_article(title, content, Some("zh"));
        ScoredArticle {
            article_id: id,
            published_date: published,
            category_scores: keywords.category_scores,
            polarity: sentiment.polarity,
            confidence: sentiment.confidence,
        }
    }

    #[test]
    fn test_single_article_window_is_scored_below_full_confidence() {
        let weights = AggregationWeights::new(0.4, 0.6, 1.0).unwrap();
        let articles = vec![scored(1, HEADLINE, BODY, day(3))];
        assert!(articles[0].confidence >= 0.5);

        let impact = aggregate_window(&articles, "monetary_policy", day(1), day(7), 0.5, &weights);
        assert_eq!(impact.status, AggregateStatus::Scored);
        assert_eq!(impact.included, 1);
        let confidence = impact.confidence.unwrap();
        assert!(confidence > 0.0 && confidence < 1.0);
        assert!(impact.mean_polarity.unwrap() < 0.0);
    }

    #[test]
    fn test_low_confidence_articles_are_excluded_not_zeroed() {
        let weights = AggregationWeights::new(0.4, 0.6, 1.0).unwrap();
        let articles = vec![scored(1, "央行宣布加息以应对通胀", "", day(3)), scored(2, HEADLINE, BODY, day(4))];

        let impact = aggregate_window(&articles, "monetary_policy", day(1), day(7), 0.5, &weights);
        assert_eq!(impact.status, AggregateStatus::Scored);
        assert_eq!(impact.included, 1);
        assert_eq!(impact.excluded, 1);

        let impact = aggregate_window(&articles, "monetary_policy", day(1), day(7), 0.99, &weights);
        assert_eq!(impact.status, AggregateStatus::Insufficient);
        assert_eq!(impact.impact_score, None);
        assert_eq!(impact.excluded, 2);
    }

    #[test]
    fn test_articles_outside_window_are_ignored() {
        let weights = AggregationWeights::new(0.4, 0.6, 1.0).unwrap();
        let articles = vec![scored(1, HEADLINE, BODY, day(20))];

        let impact = aggregate_window(&articles, "monetary_policy", day(1), day(7), 0.5, &weights);
        assert_eq!(impact.status, AggregateStatus::Insufficient);
        assert_eq!(impact.excluded, 0);
    }
}
