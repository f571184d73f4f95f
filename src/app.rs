use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::{
    api,
    clients::{SemaSmsClient, SmsGateway, semasms::SemaSmsConfig},
    config::Config,
    dispatch::BulkDispatcher,
    observability::Telemetry,
    store::{BatchLedger, PgBatchLedger, schema},
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    pool: Option<PgPool>,
    ledger: Arc<dyn BatchLedger>,
    dispatcher: BulkDispatcher,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn config(&self) -> &Config {
        &self.registry.config
    }

    pub(crate) fn ledger(&self) -> Arc<dyn BatchLedger> {
        Arc::clone(&self.registry.ledger)
    }

    pub(crate) fn dispatcher(&self) -> &BulkDispatcher {
        &self.registry.dispatcher
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// DB接続は遅延確立のため、この時点ではデータベースに接続しない。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築、接続プール設定が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;
        let gateway: Arc<dyn SmsGateway> = Arc::new(
            SemaSmsClient::new(SemaSmsConfig {
                endpoint: config.semasms_api_url().to_string(),
                connect_timeout: config.semasms_connect_timeout(),
                total_timeout: config.semasms_total_timeout(),
            })
            .context("failed to build SemaSMS client")?,
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.sms_db_max_connections())
            .min_connections(config.sms_db_min_connections())
            .acquire_timeout(config.sms_db_acquire_timeout())
            .test_before_acquire(true)
            .connect_lazy(config.sms_db_dsn())
            .context("failed to configure sms_db connection pool")?;
        let ledger: Arc<dyn BatchLedger> = Arc::new(PgBatchLedger::new(pool.clone()));

        Ok(Self::assemble(
            config,
            telemetry,
            Some(pool),
            gateway,
            ledger,
        ))
    }

    /// 既に構築済みの依存からレジストリを組み立てる。
    #[must_use]
    pub fn from_parts(
        config: Config,
        telemetry: Telemetry,
        gateway: Arc<dyn SmsGateway>,
        ledger: Arc<dyn BatchLedger>,
    ) -> Self {
        Self::assemble(config, telemetry, None, gateway, ledger)
    }

    fn assemble(
        config: Config,
        telemetry: Telemetry,
        pool: Option<PgPool>,
        gateway: Arc<dyn SmsGateway>,
        ledger: Arc<dyn BatchLedger>,
    ) -> Self {
        let dispatcher = BulkDispatcher::new(gateway, Arc::clone(&ledger))
            .with_metrics(telemetry.metrics_arc());
        Self {
            config: Arc::new(config),
            telemetry,
            pool,
            ledger,
            dispatcher,
        }
    }

    /// 設定で有効な場合、起動時にテーブルとインデックスを作成する。
    ///
    /// # Errors
    /// スキーマの作成に失敗した場合はエラーを返す。
    pub async fn prepare_storage(&self) -> Result<()> {
        match &self.pool {
            Some(pool) if self.config.sms_db_init_schema() => schema::ensure_schema(pool)
                .await
                .context("failed to initialize sms_db schema"),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
