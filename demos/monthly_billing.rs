/// monthly billing - generate fees, collect payments, let the scheduler take over
use std::sync::Arc;

use apartment_billing_rs::{
    Apartment, Area, BillingPeriod, CalculatorRegistry, FeeCreateRequest, FeeLifecycle, FeeScheduler, FeeType,
    GenerationParams, GenerationSummary, InMemoryStore, Money, MonthlyFeeGenerator,
    PaymentReconciler, PaymentRequest, Resident, SafeTimeProvider, SchedulerConfig, TimeSource,
    VehicleCategory,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apartment_billing_rs=info".into()),
        )
        .init();

    println!("=== monthly billing example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();

    // building setup
    let store = Arc::new(InMemoryStore::new());
    store.add_apartment(Apartment::new(101, Area::from_sqm(75)))?;
    store.add_apartment(Apartment::new(102, Area::from_sqm(60)))?;
    store.add_resident(Resident {
        id: 1,
        name: "Tran Thi B".to_string(),
        apartment_id: Some(101),
    })?;
    store.set_price(VehicleCategory::Motorbike, Money::from_major(70_000))?;
    store.set_price(VehicleCategory::Car, Money::from_major(1_200_000))?;
    store.set_vehicle_count(101, VehicleCategory::Car, 1)?;

    // floor area fees for june
    let registry = CalculatorRegistry::standard(store.clone(), store.clone());
    let mut generator = MonthlyFeeGenerator::new(store.clone(), store.clone(), registry);
    let period = BillingPeriod::new(2025, 6)?;
    let params = GenerationParams::new(period)
        .with_unit_price(Money::from_major(7_000))
        .with_label("Management fee");
    let report = generator.generate_for_all(FeeType::FloorArea, &params, &time)?;
    println!("{}", GenerationSummary::from_report(&report).to_json_pretty()?);

    // running it again bills nobody twice
    let rerun = generator.generate_for_all(FeeType::FloorArea, &params, &time)?;
    println!("rerun: {} created, {} skipped\n", rerun.created_count(), rerun.skipped_count());

    // resident pays the management fee in two instalments
    let fee = report.into_created().into_iter().find(|f| f.apartment_id == Some(101)).ok_or("no fee for 101")?;
    let mut reconciler = PaymentReconciler::new(store.clone(), store.clone(), store.clone(), store.clone());

    controller.advance(Duration::days(4));
    let today = time.now().date_naive();
    let first = reconciler.create_payment(PaymentRequest::new(1, fee.id, today, Money::from_major(200_000)), &time)?;
    println!("paid {}, remaining {}", first.amount, first.remaining_amount);

    let rest = first.remaining_amount;
    let second = reconciler.create_payment(PaymentRequest::new(1, fee.id, today, rest), &time)?;
    println!("paid {}, fully paid: {}, fee active: {}\n", second.amount, second.is_fully_paid, second.fee_active);

    // a voluntary contribution drive
    let mut lifecycle = FeeLifecycle::new(store.clone(), store.clone(), store.clone());
    let drive = FeeCreateRequest::new("Flood relief", FeeType::VoluntaryGeneral, Money::from_major(100_000));
    let created = lifecycle.create_voluntary_for_all(drive, &time)?;
    println!("voluntary fees created: {}", created.len());

    // hand over to the scheduler for july
    let mut scheduler = FeeScheduler::new(SchedulerConfig::standard(), generator, store.clone())?;
    let seeded = scheduler.initialize_default_configs()?;
    println!("seeded {seeded} default fee configs\n");

    for (hour, minute) in [(1, 0), (2, 0), (3, 0), (8, 0)] {
        let at = Utc.with_ymd_and_hms(2025, 7, 1, hour, minute, 0).unwrap();
        let tick = scheduler.tick_at(at);
        for run in &tick.runs {
            println!("{} {}: {:?}", tick.at.format("%Y-%m-%d %H:%M"), run.job, run.outcome);
        }
    }

    println!("\nscheduler events: {}", scheduler.events.events().len());
    Ok(())
}
