//! `careline seed` — Insert sample customers for local testing.

use careline_config::AppConfig;
use careline_core::domain::NewCustomer;
use careline_core::store::ChatStore;
use careline_store::SqliteStore;
use chrono::NaiveDate;

fn sample_customers() -> Vec<NewCustomer> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    vec![
        NewCustomer {
            phone_number: "01012345678".into(),
            name: Some("김철수".into()),
            birth_date: date(1990, 5, 15),
            is_member: true,
            current_plan: Some("5G 슬림 14GB".into()),
            subscription_date: date(2022, 3, 1),
        },
        NewCustomer {
            phone_number: "01087654321".into(),
            name: Some("이영희".into()),
            birth_date: date(1985, 8, 22),
            is_member: true,
            current_plan: Some("5G 심플 49".into()),
            subscription_date: date(2021, 7, 15),
        },
        NewCustomer {
            phone_number: "01011112222".into(),
            name: Some("박지민".into()),
            birth_date: date(2000, 12, 3),
            is_member: true,
            current_plan: Some("5G Y 베이직".into()),
            subscription_date: date(2023, 1, 10),
        },
        NewCustomer {
            phone_number: "01055556666".into(),
            name: Some("최민수".into()),
            birth_date: date(1955, 2, 28),
            is_member: true,
            current_plan: Some("5G 시니어 베이직".into()),
            subscription_date: date(2020, 11, 5),
        },
        // Non-member, for the first-contact path.
        NewCustomer {
            phone_number: "01099998888".into(),
            name: Some("정미영".into()),
            birth_date: date(1995, 6, 10),
            is_member: false,
            current_plan: None,
            subscription_date: None,
        },
    ]
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = SqliteStore::new(&config.database.url).await?;

    let mut created = 0usize;
    for customer in sample_customers() {
        if store
            .find_customer_by_phone(&customer.phone_number)
            .await?
            .is_some()
        {
            println!("Already exists: {}", customer.phone_number);
            continue;
        }
        let inserted = store.insert_customer(customer).await?;
        println!(
            "Created: {} ({})",
            inserted.phone_number,
            inserted.name.as_deref().unwrap_or("-")
        );
        created += 1;
    }

    println!("Sample data ready: {created} customers created");
    Ok(())
}
