use std::{future::Future, sync::Arc, time::Duration};

use anyhow::anyhow;
use chrono::{DateTime, FixedOffset, Utc};
use crates::domain::{
    entities::{
        payment_histories::InsertPaymentHistoryEntity,
        payment_outbox::InsertOutboxEventEntity,
        payments::{InsertPaymentEntity, PaymentEntity, PaymentTransitionChangeset},
    },
    repositories::{
        event_publisher::EventPublisher,
        invoices::{InvoiceRenderer, InvoiceStorage},
        payment_gateway::{GatewayError, PaymentGateway, PaymentLinkRequest},
        payments::{DuplicatePayment, PaymentRepository, PaymentUnitOfWork},
    },
    value_objects::{
        enums::{event_deliveries::EventDelivery, payment_statuses::PaymentStatus},
        expiry_window::ExpiryWindow,
        pagination::Paginated,
        payments::{CreatePaymentModel, ListPaymentsQuery, PaymentDto, WebhookModel},
    },
};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    invoices::{
        InvoiceInput, build_invoice_document, generate_invoice_number, invoice_storage_key,
    },
    payment_events::{build_payment_event, encode_payment_event},
};

const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid payment request: {0}")]
    Validation(String),
    #[error("payment not found: {0}")]
    NotFound(String),
    #[error("payment gateway error: {0}")]
    Gateway(#[source] GatewayError),
    #[error("invoice could not be generated")]
    Artifact(#[source] anyhow::Error),
    #[error("payment store error")]
    Store(#[source] anyhow::Error),
    #[error("payment {order_id} was updated but its event was not published")]
    Publish {
        order_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("payment workflow cancelled")]
    Cancelled,
}

impl PaymentError {
    /// Stable category name for callers that map errors onto their own
    /// responses.
    pub fn category(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "validation",
            PaymentError::NotFound(_) => "not_found",
            PaymentError::Gateway(_) => "gateway",
            PaymentError::Artifact(_) => "artifact",
            PaymentError::Store(_) => "store",
            PaymentError::Publish { .. } => "publish",
            PaymentError::Cancelled => "cancelled",
        }
    }

    /// True when the store transaction committed before the failure.
    pub fn is_committed(&self) -> bool {
        matches!(self, PaymentError::Publish { .. })
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub topic: String,
    pub sender: String,
    pub invoice_template_id: String,
    pub invoice_offset: FixedOffset,
    pub workflow_timeout: Duration,
    pub event_delivery: EventDelivery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Transitioned(PaymentDto),
    /// The webhook did not describe an allowed transition; nothing changed.
    Ignored { current: PaymentStatus },
}

enum ReconcileCommit {
    Transitioned {
        payment: PaymentEntity,
        event: Option<Vec<u8>>,
    },
    Ignored {
        current: PaymentStatus,
    },
}

pub struct PaymentUseCase<R, G, Rn, S, P>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    Rn: InvoiceRenderer + Send + Sync + 'static,
    S: InvoiceStorage + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    payment_repo: Arc<R>,
    gateway: Arc<G>,
    renderer: Arc<Rn>,
    storage: Arc<S>,
    publisher: Arc<P>,
    settings: PaymentSettings,
}

impl<R, G, Rn, S, P> PaymentUseCase<R, G, Rn, S, P>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    Rn: InvoiceRenderer + Send + Sync + 'static,
    S: InvoiceStorage + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<R>,
        gateway: Arc<G>,
        renderer: Arc<Rn>,
        storage: Arc<S>,
        publisher: Arc<P>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            payment_repo,
            gateway,
            renderer,
            storage,
            publisher,
            settings,
        }
    }

    pub async fn create(
        &self,
        request: CreatePaymentModel,
        cancel: &CancellationToken,
    ) -> UseCaseResult<PaymentDto> {
        info!(
            order_id = %request.order_id,
            amount = request.amount,
            expired_at = %request.expired_at,
            "payments: create requested"
        );

        let expiry = validate_create(&request, Utc::now()).inspect_err(|err| {
            warn!(
                order_id = %request.order_id,
                reason = %err,
                "payments: create rejected"
            );
        })?;

        let deadline = self.deadline();
        let payment = self
            .run_guarded(cancel, deadline, self.create_in_transaction(&request, expiry))
            .await?;

        info!(
            order_id = %payment.order_id,
            payment_uuid = %payment.uuid,
            "payments: payment created"
        );
        Ok(PaymentDto::from(payment))
    }

    /// Applies a gateway notification. Settlement renders and stores the
    /// invoice inside the same transaction as the status change; the event
    /// goes out after commit (or into the outbox, depending on settings).
    pub async fn reconcile(
        &self,
        webhook: WebhookModel,
        cancel: &CancellationToken,
    ) -> UseCaseResult<ReconcileOutcome> {
        info!(
            order_id = %webhook.order_id,
            transaction_status = %webhook.transaction_status,
            transaction_id = %webhook.transaction_id,
            payment_type = %webhook.payment_type,
            "payments: webhook received"
        );

        let deadline = self.deadline();
        let committed = self
            .run_guarded(cancel, deadline, self.reconcile_in_transaction(&webhook))
            .await?;

        match committed {
            ReconcileCommit::Ignored { current } => Ok(ReconcileOutcome::Ignored { current }),
            ReconcileCommit::Transitioned { payment, event } => {
                if let Some(message) = event {
                    self.publish_committed(&payment, message, cancel, deadline)
                        .await?;
                }
                Ok(ReconcileOutcome::Transitioned(PaymentDto::from(payment)))
            }
        }
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> UseCaseResult<PaymentDto> {
        info!(payment_uuid = %uuid, "payments: loading payment");

        let payment = self
            .payment_repo
            .find_by_uuid(uuid)
            .await
            .map_err(|err| store_failure(err, &uuid.to_string(), "find payment by uuid"))?
            .ok_or_else(|| {
                info!(payment_uuid = %uuid, "payments: payment not found");
                PaymentError::NotFound(uuid.to_string())
            })?;

        Ok(PaymentDto::from(payment))
    }

    pub async fn list(&self, query: ListPaymentsQuery) -> UseCaseResult<Paginated<PaymentDto>> {
        if query.page < 1 {
            return Err(PaymentError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&query.limit) {
            return Err(PaymentError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        let offset = (query.page - 1)
            .checked_mul(query.limit)
            .ok_or_else(|| PaymentError::Validation("page is out of range".to_string()))?;
        let (payments, total) = self
            .payment_repo
            .list_payments(query.limit, offset)
            .await
            .map_err(|err| store_failure(err, "-", "list payments"))?;

        info!(
            page = query.page,
            limit = query.limit,
            total,
            returned = payments.len(),
            "payments: payments listed"
        );

        Ok(Paginated::new(
            payments.into_iter().map(PaymentDto::from).collect(),
            total,
            query.page,
            query.limit,
        ))
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.settings.workflow_timeout
    }

    /// Races `workflow` against the caller's token and the deadline. Losing the
    /// race drops the workflow future, and with it any open unit of work.
    async fn run_guarded<T, F>(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
        workflow: F,
    ) -> UseCaseResult<T>
    where
        F: Future<Output = UseCaseResult<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("payments: workflow cancelled by caller, transaction rolled back");
                Err(PaymentError::Cancelled)
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(
                    timeout_ms = self.settings.workflow_timeout.as_millis() as u64,
                    "payments: workflow deadline exceeded, transaction rolled back"
                );
                Err(PaymentError::Cancelled)
            }
            result = workflow => result,
        }
    }

    async fn create_in_transaction(
        &self,
        request: &CreatePaymentModel,
        expiry: ExpiryWindow,
    ) -> UseCaseResult<PaymentEntity> {
        let mut uow = self
            .payment_repo
            .begin()
            .await
            .map_err(|err| store_failure(err, &request.order_id, "begin transaction"))?;

        let result = self.create_steps(&mut *uow, request, expiry).await;
        finish(&mut *uow, result, &request.order_id).await
    }

    async fn create_steps(
        &self,
        uow: &mut dyn PaymentUnitOfWork,
        request: &CreatePaymentModel,
        expiry: ExpiryWindow,
    ) -> UseCaseResult<PaymentEntity> {
        let order_id = request.order_id.as_str();

        let existing = uow
            .lock_by_order_id(order_id)
            .await
            .map_err(|err| store_failure(err, order_id, "check existing payment"))?;
        if existing.is_some() {
            warn!(order_id = %order_id, "payments: order already has a payment");
            return Err(PaymentError::Validation(format!(
                "order {order_id} already has a payment"
            )));
        }

        let item = request.item_details.first().cloned().ok_or_else(|| {
            PaymentError::Validation("at least one item is required".to_string())
        })?;

        let link = self
            .gateway
            .create_payment_link(PaymentLinkRequest {
                order_id: order_id.to_string(),
                amount: request.amount,
                customer: request.customer_detail.clone(),
                item,
                expiry,
            })
            .await
            .map_err(|err| {
                error!(
                    order_id = %order_id,
                    gateway_error = ?err,
                    "payments: gateway failed to create payment link"
                );
                PaymentError::Gateway(err)
            })?;

        let payment = uow
            .insert_payment(InsertPaymentEntity {
                uuid: Uuid::new_v4(),
                order_id: order_id.to_string(),
                amount: request.amount,
                status: PaymentStatus::Pending.code(),
                payment_link: link.redirect_url,
                description: request.description.clone(),
                expired_at: request.expired_at,
            })
            .await
            .map_err(|err| {
                if err.downcast_ref::<DuplicatePayment>().is_some() {
                    warn!(order_id = %order_id, "payments: order already has a payment");
                    PaymentError::Validation(format!("order {order_id} already has a payment"))
                } else {
                    store_failure(err, order_id, "insert payment")
                }
            })?;

        uow.append_history(InsertPaymentHistoryEntity {
            payment_id: payment.id,
            status: PaymentStatus::Pending.as_str().to_string(),
        })
        .await
        .map_err(|err| store_failure(err, order_id, "append history"))?;

        info!(
            order_id = %order_id,
            expiry_unit = ?expiry.unit,
            expiry_duration = expiry.duration,
            "payments: payment link stored"
        );

        Ok(payment)
    }

    async fn reconcile_in_transaction(
        &self,
        webhook: &WebhookModel,
    ) -> UseCaseResult<ReconcileCommit> {
        let mut uow = self
            .payment_repo
            .begin()
            .await
            .map_err(|err| store_failure(err, &webhook.order_id, "begin transaction"))?;

        let result = self.reconcile_steps(&mut *uow, webhook).await;
        finish(&mut *uow, result, &webhook.order_id).await
    }

    async fn reconcile_steps(
        &self,
        uow: &mut dyn PaymentUnitOfWork,
        webhook: &WebhookModel,
    ) -> UseCaseResult<ReconcileCommit> {
        let order_id = webhook.order_id.as_str();

        let payment = uow
            .lock_by_order_id(order_id)
            .await
            .map_err(|err| store_failure(err, order_id, "lock payment"))?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "payments: webhook for unknown order");
                PaymentError::NotFound(order_id.to_string())
            })?;

        let current = payment.payment_status().ok_or_else(|| {
            store_failure(
                anyhow!("unknown payment status code {}", payment.status),
                order_id,
                "decode payment status",
            )
        })?;
        let target = webhook.transaction_status;

        if !current.can_transition_to(target) {
            info!(
                order_id = %order_id,
                current = %current,
                requested = %target,
                "payments: webhook ignored, no transition"
            );
            return Ok(ReconcileCommit::Ignored { current });
        }

        let now = Utc::now();
        let paid_at = (target == PaymentStatus::Settlement).then_some(now);
        let virtual_account = webhook.va_numbers.first();

        let changes = PaymentTransitionChangeset {
            status: target.code(),
            transaction_id: Some(webhook.transaction_id.clone()),
            paid_at,
            va_number: virtual_account.map(|va| va.va_number.clone()),
            bank: virtual_account.map(|va| va.bank.to_uppercase()),
            acquirer: webhook.acquirer.clone(),
            updated_at: now,
        };

        let Some(mut updated) = uow
            .apply_transition(payment.id, changes)
            .await
            .map_err(|err| store_failure(err, order_id, "apply transition"))?
        else {
            warn!(
                order_id = %order_id,
                "payments: payment moved concurrently, webhook ignored"
            );
            return Ok(ReconcileCommit::Ignored { current });
        };

        uow.append_history(InsertPaymentHistoryEntity {
            payment_id: updated.id,
            status: target.as_str().to_string(),
        })
        .await
        .map_err(|err| store_failure(err, order_id, "append history"))?;

        if let Some(paid_at) = paid_at {
            updated = self
                .attach_invoice(uow, &updated, &webhook.payment_type, paid_at)
                .await?;
        }

        let message = build_payment_event(&self.settings.sender, &updated, target, now);
        let event = match self.settings.event_delivery {
            EventDelivery::Direct => Some(
                encode_payment_event(&message)
                    .map_err(|err| store_failure(err, order_id, "encode event"))?,
            ),
            EventDelivery::Outbox => {
                let payload = serde_json::to_value(&message)
                    .map_err(|err| store_failure(err.into(), order_id, "encode event"))?;
                let outbox_id = uow
                    .enqueue_outbox(InsertOutboxEventEntity {
                        topic: self.settings.topic.clone(),
                        payload,
                    })
                    .await
                    .map_err(|err| store_failure(err, order_id, "enqueue outbox event"))?;
                info!(order_id = %order_id, outbox_id, "payments: event queued in outbox");
                None
            }
        };

        info!(
            order_id = %order_id,
            payment_uuid = %updated.uuid,
            from = %current,
            to = %target,
            "payments: payment transitioned"
        );

        Ok(ReconcileCommit::Transitioned {
            payment: updated,
            event,
        })
    }

    async fn attach_invoice(
        &self,
        uow: &mut dyn PaymentUnitOfWork,
        payment: &PaymentEntity,
        payment_type: &str,
        paid_at: DateTime<Utc>,
    ) -> UseCaseResult<PaymentEntity> {
        let order_id = payment.order_id.as_str();
        let offset = self.settings.invoice_offset;
        let invoice_number = generate_invoice_number(Utc::now().with_timezone(&offset).date_naive());

        let document = build_invoice_document(InvoiceInput {
            invoice_number: invoice_number.clone(),
            payment,
            payment_type,
            paid_at,
            offset,
        });
        let data = serde_json::to_value(&document)
            .map_err(|err| artifact_failure(err.into(), order_id, "encode invoice"))?;

        let pdf = self
            .renderer
            .render(&self.settings.invoice_template_id, data)
            .await
            .map_err(|err| artifact_failure(err, order_id, "render invoice"))?;

        let invoice_link = self
            .storage
            .store(&invoice_storage_key(&invoice_number), pdf)
            .await
            .map_err(|err| artifact_failure(err, order_id, "store invoice"))?;

        let updated = uow
            .set_invoice_link(payment.id, &invoice_link)
            .await
            .map_err(|err| store_failure(err, order_id, "write invoice link"))?;

        info!(
            order_id = %order_id,
            invoice_number = %invoice_number,
            invoice_link = %invoice_link,
            "payments: invoice attached"
        );

        Ok(updated)
    }

    async fn publish_committed(
        &self,
        payment: &PaymentEntity,
        message: Vec<u8>,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> UseCaseResult<()> {
        let topic = self.settings.topic.as_str();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(anyhow!("event publish cancelled")),
            _ = tokio::time::sleep_until(deadline) => Err(anyhow!("event publish deadline exceeded")),
            result = self.publisher.publish(topic, message) => result,
        };

        match result {
            Ok(()) => {
                info!(
                    order_id = %payment.order_id,
                    payment_uuid = %payment.uuid,
                    topic = %topic,
                    "payments: event published"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    order_id = %payment.order_id,
                    payment_uuid = %payment.uuid,
                    topic = %topic,
                    publish_error = ?err,
                    "payments: event publish failed after commit"
                );
                Err(PaymentError::Publish {
                    order_id: payment.order_id.clone(),
                    source: err,
                })
            }
        }
    }
}

fn validate_create(request: &CreatePaymentModel, now: DateTime<Utc>) -> UseCaseResult<ExpiryWindow> {
    if request.order_id.trim().is_empty() {
        return Err(PaymentError::Validation("orderId is required".to_string()));
    }
    if request.amount <= 0 {
        return Err(PaymentError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    if request.item_details.is_empty() {
        return Err(PaymentError::Validation(
            "at least one item is required".to_string(),
        ));
    }

    ExpiryWindow::until(request.expired_at, now)
        .ok_or_else(|| PaymentError::Validation("expiredAt must be in the future".to_string()))
}

/// Commits on success, rolls back otherwise.
async fn finish<T>(
    uow: &mut dyn PaymentUnitOfWork,
    result: UseCaseResult<T>,
    order_id: &str,
) -> UseCaseResult<T> {
    match result {
        Ok(value) => {
            uow.commit()
                .await
                .map_err(|err| store_failure(err, order_id, "commit"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(
                    order_id = %order_id,
                    db_error = ?rollback_err,
                    "payments: rollback failed"
                );
            }
            Err(err)
        }
    }
}

fn store_failure(err: anyhow::Error, order_id: &str, step: &'static str) -> PaymentError {
    error!(
        order_id = %order_id,
        step,
        db_error = ?err,
        "payments: store operation failed"
    );
    PaymentError::Store(err)
}

fn artifact_failure(err: anyhow::Error, order_id: &str, step: &'static str) -> PaymentError {
    error!(
        order_id = %order_id,
        step,
        artifact_error = ?err,
        "payments: invoice pipeline failed"
    );
    PaymentError::Artifact(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use crates::{
        domain::{
            repositories::{
                event_publisher::MockEventPublisher,
                invoices::{MockInvoiceRenderer, MockInvoiceStorage},
                payment_gateway::{MockPaymentGateway, PaymentLink},
                payments::{MockPaymentRepository, MockPaymentUnitOfWork},
            },
            value_objects::{
                expiry_window::ExpiryUnit,
                payments::{CustomerDetail, ItemDetail, VaNumber},
            },
        },
        infra::db::in_memory::InMemoryPaymentStore,
    };
    use mockall::predicate;
    use std::sync::Mutex;

    type Published = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    fn settings(event_delivery: EventDelivery) -> PaymentSettings {
        PaymentSettings {
            topic: "payment-service-callback".to_string(),
            sender: "payment-service".to_string(),
            invoice_template_id: "invoice".to_string(),
            invoice_offset: FixedOffset::east_opt(7 * 3600).unwrap(),
            workflow_timeout: Duration::from_secs(5),
            event_delivery,
        }
    }

    fn use_case<Rn>(
        store: &InMemoryPaymentStore,
        gateway: MockPaymentGateway,
        renderer: Rn,
        storage: MockInvoiceStorage,
        publisher: MockEventPublisher,
        settings: PaymentSettings,
    ) -> PaymentUseCase<InMemoryPaymentStore, MockPaymentGateway, Rn, MockInvoiceStorage, MockEventPublisher>
    where
        Rn: InvoiceRenderer + Send + Sync + 'static,
    {
        PaymentUseCase::new(
            Arc::new(store.clone()),
            Arc::new(gateway),
            Arc::new(renderer),
            Arc::new(storage),
            Arc::new(publisher),
            settings,
        )
    }

    fn create_request(order_id: &str, expired_at: DateTime<Utc>) -> CreatePaymentModel {
        CreatePaymentModel {
            order_id: order_id.to_string(),
            amount: 100_000,
            customer_detail: CustomerDetail {
                name: "Budi".to_string(),
                email: "budi@example.com".to_string(),
                phone: "08123456789".to_string(),
            },
            item_details: vec![ItemDetail {
                id: "field-1".to_string(),
                name: "Field rental".to_string(),
                price: 100_000,
                quantity: 1,
            }],
            expired_at,
            description: Some("Field rental".to_string()),
        }
    }

    fn webhook(order_id: &str, status: PaymentStatus, va_numbers: Vec<VaNumber>) -> WebhookModel {
        WebhookModel {
            order_id: order_id.to_string(),
            transaction_status: status,
            transaction_id: "trx-1".to_string(),
            va_numbers,
            acquirer: None,
            payment_type: "bank_transfer".to_string(),
        }
    }

    fn bca() -> Vec<VaNumber> {
        vec![VaNumber {
            bank: "bca".to_string(),
            va_number: "12345".to_string(),
        }]
    }

    fn gateway_ok() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_link().returning(|request| {
            Ok(PaymentLink {
                redirect_url: format!(
                    "https://app.sandbox.midtrans.com/snap/v4/redirection/{}",
                    request.order_id
                ),
                token: "snap-token".to_string(),
            })
        });
        gateway
    }

    fn renderer_ok() -> MockInvoiceRenderer {
        let mut renderer = MockInvoiceRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_, _| Ok(b"%PDF-1.7".to_vec()));
        renderer
    }

    fn storage_ok() -> MockInvoiceStorage {
        let mut storage = MockInvoiceStorage::new();
        storage
            .expect_store()
            .times(1)
            .returning(|key, _| Ok(format!("https://files.example.com/invoices/{key}")));
        storage
    }

    fn publisher_capturing(published: &Published) -> MockEventPublisher {
        let sink = Arc::clone(published);
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(move |topic, message| {
            sink.lock().unwrap().push((topic.to_string(), message));
            Ok(())
        });
        publisher
    }

    async fn seed_pending(store: &InMemoryPaymentStore, order_id: &str) -> PaymentEntity {
        let mut uow = store.begin().await.unwrap();
        let payment = uow
            .insert_payment(InsertPaymentEntity {
                uuid: Uuid::new_v4(),
                order_id: order_id.to_string(),
                amount: 100_000,
                status: PaymentStatus::Pending.code(),
                payment_link: "https://pay.example/link".to_string(),
                description: Some("Field rental".to_string()),
                expired_at: Utc::now() + ChronoDuration::hours(1),
            })
            .await
            .unwrap();
        uow.append_history(InsertPaymentHistoryEntity {
            payment_id: payment.id,
            status: "pending".to_string(),
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();
        payment
    }

    struct SlowRenderer;

    #[async_trait]
    impl InvoiceRenderer for SlowRenderer {
        async fn render(&self, _template_id: &str, _data: serde_json::Value) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn create_persists_pending_payment_with_one_history_row() {
        let store = InMemoryPaymentStore::new();
        let payments = use_case(
            &store,
            gateway_ok(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let created = payments
            .create(
                create_request("ORD-1", Utc::now() + ChronoDuration::hours(1)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(created.status, "pending");
        assert_eq!(created.amount, 100_000);
        assert!(!created.payment_link.is_empty());

        let stored = store.find_by_order_id("ORD-1").await.unwrap().unwrap();
        assert_eq!(stored.uuid, created.uuid);
        assert_eq!(store.list_history(stored.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_losing_insert_race_is_a_validation_error() {
        let mut uow = MockPaymentUnitOfWork::new();
        uow.expect_lock_by_order_id().returning(|_| Ok(None));
        uow.expect_insert_payment()
            .times(1)
            .returning(|payment| Err(DuplicatePayment(payment.order_id).into()));
        uow.expect_append_history().never();
        uow.expect_commit().never();
        uow.expect_rollback().times(1).returning(|| Ok(()));
        let uow: Box<dyn PaymentUnitOfWork> = Box::new(uow);

        let mut repository = MockPaymentRepository::new();
        repository.expect_begin().return_once(move || Ok(uow));

        let payments = PaymentUseCase::new(
            Arc::new(repository),
            Arc::new(gateway_ok()),
            Arc::new(MockInvoiceRenderer::new()),
            Arc::new(MockInvoiceStorage::new()),
            Arc::new(MockEventPublisher::new()),
            settings(EventDelivery::Direct),
        );

        let err = payments
            .create(
                create_request("ORD-RACE", Utc::now() + ChronoDuration::hours(1)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(!err.is_committed());
    }

    #[tokio::test]
    async fn create_sizes_gateway_expiry_window() {
        let store = InMemoryPaymentStore::new();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_link()
            .with(predicate::function(|request: &PaymentLinkRequest| {
                request.expiry.unit == ExpiryUnit::Day
                    && request.expiry.duration == 2
                    && request.item.id == "field-1"
            }))
            .returning(|_| {
                Ok(PaymentLink {
                    redirect_url: "https://pay.example/abc".to_string(),
                    token: "token".to_string(),
                })
            });
        let payments = use_case(
            &store,
            gateway,
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let expired_at = Utc::now() + ChronoDuration::hours(50);
        payments
            .create(create_request("ORD-2", expired_at), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_with_past_expiry_is_rejected_without_side_effects() {
        let store = InMemoryPaymentStore::new();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_link().never();
        let payments = use_case(
            &store,
            gateway,
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        for expired_at in [Utc::now(), Utc::now() - ChronoDuration::minutes(5)] {
            let err = payments
                .create(create_request("ORD-3", expired_at), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::Validation(_)));
        }

        assert!(store.find_by_order_id("ORD-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gateway_failure_persists_nothing() {
        let store = InMemoryPaymentStore::new();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_link().returning(|_| {
            Err(GatewayError::Rejected {
                status: 401,
                message: "Access denied".to_string(),
            })
        });
        let payments = use_case(
            &store,
            gateway,
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let err = payments
            .create(
                create_request("ORD-4", Utc::now() + ChronoDuration::hours(1)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), "gateway");
        assert!(store.find_by_order_id("ORD-4").await.unwrap().is_none());
        let (all, total) = store.list_payments(10, 0).await.unwrap();
        assert!(all.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn duplicate_order_is_rejected() {
        let store = InMemoryPaymentStore::new();
        seed_pending(&store, "ORD-5").await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_link().never();
        let payments = use_case(
            &store,
            gateway,
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let err = payments
            .create(
                create_request("ORD-5", Utc::now() + ChronoDuration::hours(1)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn commit_failure_on_create_is_a_store_error() {
        let store = InMemoryPaymentStore::new();
        store.fail_next_commit();
        let payments = use_case(
            &store,
            gateway_ok(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let err = payments
            .create(
                create_request("ORD-6", Utc::now() + ChronoDuration::hours(1)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), "store");
        assert!(store.find_by_order_id("ORD-6").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_then_settle_produces_invoice_and_one_event() {
        let store = InMemoryPaymentStore::new();
        let published: Published = Arc::default();
        let payments = use_case(
            &store,
            gateway_ok(),
            renderer_ok(),
            storage_ok(),
            publisher_capturing(&published),
            settings(EventDelivery::Direct),
        );
        let cancel = CancellationToken::new();

        let created = payments
            .create(
                create_request("ORD-100", Utc::now() + ChronoDuration::hours(1)),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(created.status, "pending");
        assert!(!created.payment_link.is_empty());

        let outcome = payments
            .reconcile(webhook("ORD-100", PaymentStatus::Settlement, bca()), &cancel)
            .await
            .unwrap();

        let ReconcileOutcome::Transitioned(settled) = outcome else {
            panic!("expected a transition");
        };
        assert_eq!(settled.status, "settlement");
        assert_eq!(settled.bank.as_deref(), Some("BCA"));
        assert_eq!(settled.va_number.as_deref(), Some("12345"));
        assert_eq!(settled.transaction_id.as_deref(), Some("trx-1"));
        assert!(settled.paid_at.is_some());
        let invoice_link = settled.invoice_link.clone().unwrap();
        assert!(invoice_link.starts_with("https://files.example.com/invoices/inv-"));
        assert!(invoice_link.ends_with(".pdf"));

        let stored = store.find_by_order_id("ORD-100").await.unwrap().unwrap();
        assert_eq!(store.list_history(stored.id).await.unwrap().len(), 2);

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "payment-service-callback");
        let event: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(event["event"]["name"], "SETTLEMENT");
        assert_eq!(event["body"]["data"]["status"], "SETTLEMENT");
        assert_eq!(event["body"]["data"]["orderId"], "ORD-100");
        assert_eq!(
            event["body"]["data"]["paymentUuid"],
            created.uuid.to_string()
        );
    }

    #[tokio::test]
    async fn redelivered_webhooks_for_terminal_payment_are_noops() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-7").await;
        let published: Published = Arc::default();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer_ok(),
            storage_ok(),
            publisher_capturing(&published),
            settings(EventDelivery::Direct),
        );
        let cancel = CancellationToken::new();

        payments
            .reconcile(webhook("ORD-7", PaymentStatus::Settlement, bca()), &cancel)
            .await
            .unwrap();
        let settled = store.find_by_order_id("ORD-7").await.unwrap().unwrap();

        for status in [PaymentStatus::Settlement, PaymentStatus::Expire] {
            let outcome = payments
                .reconcile(webhook("ORD-7", status, bca()), &cancel)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                ReconcileOutcome::Ignored {
                    current: PaymentStatus::Settlement
                }
            );
        }

        let after = store.find_by_order_id("ORD-7").await.unwrap().unwrap();
        assert_eq!(after.invoice_link, settled.invoice_link);
        assert_eq!(after.paid_at, settled.paid_at);
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 2);
        assert_eq!(published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redelivered_webhooks_for_expired_payment_are_noops() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-7E").await;
        let published: Published = Arc::default();
        let mut renderer = MockInvoiceRenderer::new();
        renderer.expect_render().never();
        let mut storage = MockInvoiceStorage::new();
        storage.expect_store().never();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer,
            storage,
            publisher_capturing(&published),
            settings(EventDelivery::Direct),
        );
        let cancel = CancellationToken::new();

        payments
            .reconcile(webhook("ORD-7E", PaymentStatus::Expire, Vec::new()), &cancel)
            .await
            .unwrap();
        let expired = store.find_by_order_id("ORD-7E").await.unwrap().unwrap();

        for status in [PaymentStatus::Settlement, PaymentStatus::Expire] {
            let outcome = payments
                .reconcile(webhook("ORD-7E", status, bca()), &cancel)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                ReconcileOutcome::Ignored {
                    current: PaymentStatus::Expire
                }
            );
        }

        let after = store.find_by_order_id("ORD-7E").await.unwrap().unwrap();
        assert_eq!(after.status, PaymentStatus::Expire.code());
        assert_eq!(after.invoice_link, None);
        assert_eq!(after.paid_at, None);
        assert_eq!(after.bank, expired.bank);
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 2);
        assert_eq!(published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expire_transition_skips_invoice() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-8").await;
        let published: Published = Arc::default();
        let mut renderer = MockInvoiceRenderer::new();
        renderer.expect_render().never();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer,
            MockInvoiceStorage::new(),
            publisher_capturing(&published),
            settings(EventDelivery::Direct),
        );

        let outcome = payments
            .reconcile(
                webhook("ORD-8", PaymentStatus::Expire, Vec::new()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let ReconcileOutcome::Transitioned(expired) = outcome else {
            panic!("expected a transition");
        };
        assert_eq!(expired.status, "expire");
        assert!(expired.paid_at.is_none());
        assert!(expired.invoice_link.is_none());
        assert!(expired.bank.is_none());

        let history = store.list_history(payment.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, "expire");

        let event: serde_json::Value =
            serde_json::from_slice(&published.lock().unwrap()[0].1).unwrap();
        assert_eq!(event["body"]["data"]["status"], "EXPIRE");
    }

    #[tokio::test]
    async fn pending_webhook_for_pending_payment_is_a_noop() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-9").await;
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let outcome = payments
            .reconcile(
                webhook("ORD-9", PaymentStatus::Pending, Vec::new()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                current: PaymentStatus::Pending
            }
        );
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn artifact_failure_keeps_payment_pending() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-10").await;
        let mut renderer = MockInvoiceRenderer::new();
        renderer
            .expect_render()
            .returning(|_, _| Err(anyhow!("renderer unavailable")));
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().never();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer,
            MockInvoiceStorage::new(),
            publisher,
            settings(EventDelivery::Direct),
        );

        let err = payments
            .reconcile(
                webhook("ORD-10", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), "artifact");
        assert!(!err.is_committed());
        let after = store.find_by_order_id("ORD-10").await.unwrap().unwrap();
        assert_eq!(after.payment_status(), Some(PaymentStatus::Pending));
        assert!(after.paid_at.is_none());
        assert!(after.bank.is_none());
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_keeps_payment_pending() {
        let store = InMemoryPaymentStore::new();
        seed_pending(&store, "ORD-11").await;
        let mut storage = MockInvoiceStorage::new();
        storage
            .expect_store()
            .returning(|_, _| Err(anyhow!("bucket not found")));
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer_ok(),
            storage,
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let err = payments
            .reconcile(
                webhook("ORD-11", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Artifact(_)));
        let after = store.find_by_order_id("ORD-11").await.unwrap().unwrap();
        assert_eq!(after.payment_status(), Some(PaymentStatus::Pending));
        assert!(after.invoice_link.is_none());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let store = InMemoryPaymentStore::new();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Outbox),
        );

        let err = payments
            .reconcile(
                webhook("ORD-404", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::NotFound(ref order) if order == "ORD-404"));
        let (all, _) = store.list_payments(10, 0).await.unwrap();
        assert!(all.is_empty());
        assert!(store.outbox_events().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_reported_after_commit() {
        let store = InMemoryPaymentStore::new();
        seed_pending(&store, "ORD-12").await;
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(anyhow!("broker unreachable")));
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer_ok(),
            storage_ok(),
            publisher,
            settings(EventDelivery::Direct),
        );

        let err = payments
            .reconcile(
                webhook("ORD-12", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), "publish");
        assert!(err.is_committed());
        let after = store.find_by_order_id("ORD-12").await.unwrap().unwrap();
        assert_eq!(after.payment_status(), Some(PaymentStatus::Settlement));
        assert!(after.invoice_link.is_some());
    }

    #[tokio::test]
    async fn outbox_delivery_queues_event_in_the_transaction() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-13").await;
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().never();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            renderer_ok(),
            storage_ok(),
            publisher,
            settings(EventDelivery::Outbox),
        );

        payments
            .reconcile(
                webhook("ORD-13", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let events = store.outbox_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "payment-service-callback");
        assert!(events[0].published_at.is_none());
        assert_eq!(events[0].payload["body"]["data"]["status"], "SETTLEMENT");
        assert_eq!(
            events[0].payload["body"]["data"]["paymentUuid"],
            payment.uuid.to_string()
        );
    }

    #[tokio::test]
    async fn cancelled_token_leaves_store_untouched() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-14").await;
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = payments
            .reconcile(webhook("ORD-14", PaymentStatus::Settlement, bca()), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Cancelled));
        let after = store.find_by_order_id("ORD-14").await.unwrap().unwrap();
        assert_eq!(after.payment_status(), Some(PaymentStatus::Pending));
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deadline_during_settlement_rolls_back_the_transition() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-15").await;
        let mut short_timeout = settings(EventDelivery::Direct);
        short_timeout.workflow_timeout = Duration::from_millis(50);
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            SlowRenderer,
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            short_timeout,
        );

        let err = payments
            .reconcile(
                webhook("ORD-15", PaymentStatus::Settlement, bca()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Cancelled));
        let after = store.find_by_order_id("ORD-15").await.unwrap().unwrap();
        assert_eq!(after.payment_status(), Some(PaymentStatus::Pending));
        assert!(after.transaction_id.is_none());
        assert_eq!(store.list_history(payment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_by_uuid_returns_full_view_or_not_found() {
        let store = InMemoryPaymentStore::new();
        let payment = seed_pending(&store, "ORD-16").await;
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let found = payments.get_by_uuid(payment.uuid).await.unwrap();
        assert_eq!(found.order_id, "ORD-16");
        assert_eq!(found.expired_at, payment.expired_at);

        let err = payments.get_by_uuid(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let store = InMemoryPaymentStore::new();
        for index in 1..=3 {
            seed_pending(&store, &format!("ORD-L{index}")).await;
        }
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        let first = payments
            .list(ListPaymentsQuery { page: 1, limit: 2 })
            .await
            .unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.total_page, 2);
        assert_eq!(first.next_page, Some(2));
        let orders: Vec<_> = first.data.iter().map(|p| p.order_id.as_str()).collect();
        assert_eq!(orders, ["ORD-L3", "ORD-L2"]);

        let second = payments
            .list(ListPaymentsQuery { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.previous_page, Some(1));
    }

    #[tokio::test]
    async fn list_rejects_out_of_range_paging() {
        let store = InMemoryPaymentStore::new();
        let payments = use_case(
            &store,
            MockPaymentGateway::new(),
            MockInvoiceRenderer::new(),
            MockInvoiceStorage::new(),
            MockEventPublisher::new(),
            settings(EventDelivery::Direct),
        );

        for query in [
            ListPaymentsQuery { page: 0, limit: 10 },
            ListPaymentsQuery { page: 1, limit: 0 },
            ListPaymentsQuery { page: 1, limit: 101 },
            ListPaymentsQuery {
                page: i64::MAX,
                limit: 100,
            },
        ] {
            let err = payments.list(query).await.unwrap_err();
            assert!(matches!(err, PaymentError::Validation(_)));
        }

        let far = payments
            .list(ListPaymentsQuery {
                page: i64::MAX / 100,
                limit: 100,
            })
            .await
            .unwrap();
        assert!(far.data.is_empty());
        assert_eq!(far.next_page, None);
    }
}
