use {
    crate::domain::error::PaymentError,
    crate::domain::payment::{Payment, PaymentStatus},
    crate::store::{PaymentFilter, PaymentStore},
    chrono::{DateTime, Datelike, TimeZone, Utc},
    serde::Serialize,
    std::collections::BTreeMap,
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Rollup {
    pub count: u64,
    pub amount: i64,
}

impl Rollup {
    fn add(&mut self, p: &Payment) {
        self.count += 1;
        self.amount += p.amount().amount().minor();
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentStatistics {
    pub total_count: u64,
    /// Sum of amounts actually captured (APPROVED or later REFUNDED).
    pub captured_amount: i64,
    pub refunded_amount: i64,
    pub by_status: BTreeMap<&'static str, Rollup>,
    pub by_method: BTreeMap<&'static str, Rollup>,
    pub by_provider: BTreeMap<&'static str, Rollup>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: u32,
    pub count: u64,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct BranchStatistics {
    pub branch_id: i64,
    pub total_count: u64,
    pub captured_amount: i64,
    pub monthly: Vec<MonthlyStat>,
}

fn captured(p: &Payment) -> bool {
    matches!(
        p.status(),
        PaymentStatus::Approved | PaymentStatus::Refunded
    )
}

fn reduce(payments: &[Payment]) -> PaymentStatistics {
    let mut stats = PaymentStatistics {
        total_count: 0,
        captured_amount: 0,
        refunded_amount: 0,
        by_status: BTreeMap::new(),
        by_method: BTreeMap::new(),
        by_provider: BTreeMap::new(),
    };

    for p in payments {
        stats.total_count += 1;
        if captured(p) {
            stats.captured_amount += p.amount().amount().minor();
        }
        stats.refunded_amount += p.refunded_amount().minor();
        stats.by_status.entry(p.status().as_str()).or_default().add(p);
        stats.by_method.entry(p.method().as_str()).or_default().add(p);
        stats
            .by_provider
            .entry(p.provider().as_str())
            .or_default()
            .add(p);
    }

    stats
}

fn monthly_rollup(payments: &[Payment]) -> Vec<MonthlyStat> {
    let mut months: BTreeMap<(i32, u32), Rollup> = BTreeMap::new();
    for p in payments.iter().filter(|p| captured(p)) {
        let created = p.created_at();
        months
            .entry((created.year(), created.month()))
            .or_default()
            .add(p);
    }
    months
        .into_iter()
        .map(|((year, month), r)| MonthlyStat {
            year,
            month,
            count: r.count,
            amount: r.amount,
        })
        .collect()
}

/// Whole-store rollup, optionally bounded to a creation window.
pub async fn payment_statistics(
    store: &Arc<dyn PaymentStore>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<PaymentStatistics, PaymentError> {
    let payments = store
        .list(&PaymentFilter {
            created_from: from,
            created_to: to,
            ..Default::default()
        })
        .await?;
    Ok(reduce(&payments))
}

pub async fn branch_statistics(
    store: &Arc<dyn PaymentStore>,
    branch_id: i64,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<BranchStatistics, PaymentError> {
    let payments = store
        .list(&PaymentFilter {
            branch_id: Some(branch_id),
            created_from: from,
            created_to: to,
            ..Default::default()
        })
        .await?;

    let captured_amount: i64 = payments
        .iter()
        .filter(|p| captured(p))
        .map(|p| p.amount().amount().minor())
        .sum();

    Ok(BranchStatistics {
        branch_id,
        total_count: payments.len() as u64,
        captured_amount,
        monthly: monthly_rollup(&payments),
    })
}

pub async fn monthly_statistics(
    store: &Arc<dyn PaymentStore>,
    year: i32,
) -> Result<Vec<MonthlyStat>, PaymentError> {
    let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let to = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single();
    let (Some(from), Some(to)) = (from, to) else {
        return Err(PaymentError::Validation(format!("invalid year: {year}")));
    };

    let payments = store
        .list(&PaymentFilter {
            created_from: Some(from),
            created_to: Some(to),
            ..Default::default()
        })
        .await?;
    Ok(monthly_rollup(&payments))
}
