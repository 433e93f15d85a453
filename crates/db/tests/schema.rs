use sqlx::PgPool;

/// Connect, migrate, verify every table exists.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bootstrap(pool: PgPool) {
    autopilot_db::health_check(&pool).await.unwrap();

    let tables = [
        "sites",
        "site_knowledge",
        "site_pages",
        "tracked_keywords",
        "recommendations",
        "autopilot_settings",
        "autopilot_queue",
        "autopilot_daily_counters",
        "content_changes",
        "optimization_runs",
        "alerts",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}
