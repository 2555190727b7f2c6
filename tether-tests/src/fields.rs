use rust_decimal::Decimal;
use std::sync::LazyLock;
use tether::{
    Connection, Executor, Mapped, Values, between, equals, in_list, is_null, like, not,
};
use time::{
    Date, PrimitiveDateTime, Time,
    macros::{date, datetime, time},
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Mapped, Debug)]
struct Measurement {
    #[tether(key, auto_increment)]
    id: i64,
    label: String,
    active: bool,
    count: Option<i32>,
    ratio: f64,
    amount: Option<Decimal>,
    day: Date,
    at: Option<Time>,
    recorded: PrimitiveDateTime,
    token: Option<Uuid>,
    payload: Option<Box<[u8]>>,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn fields<X: Executor>(connection: &mut Connection<X>) {
    let _lock = MUTEX.lock().await;
    const SCHEMA: &str = "lab";

    connection
        .drop_table::<Measurement>(SCHEMA)
        .await
        .expect("Failed to drop the Measurement table");
    connection
        .create_table::<Measurement>(SCHEMA)
        .await
        .expect("Failed to create the Measurement table");

    let token = Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").unwrap();
    let first = connection
        .insert::<Measurement>(
            SCHEMA,
            Values::new()
                .with("label", "first")
                .with("active", true)
                .with("count", 777)
                .with("ratio", 0.25)
                .with("amount", Decimal::new(123456, 2))
                .with("day", date!(2024 - 02 - 29))
                .with("at", time!(12:00:10))
                .with("recorded", datetime!(2024-02-29 23:59:59))
                .with("token", token)
                .with("payload", Box::<[u8]>::from([1, 2, 3].as_slice())),
        )
        .await
        .expect("Failed to insert the first measurement");
    let second = connection
        .insert::<Measurement>(
            SCHEMA,
            Values::new()
                .with("label", "second")
                .with("active", false)
                .with("ratio", -1.5)
                .with("day", date!(1999 - 12 - 31))
                .with("recorded", datetime!(2000-01-01 00:00:00)),
        )
        .await
        .expect("Failed to insert the second measurement");
    assert_eq!(first.read().id, 1);
    assert_eq!(second.read().id, 2);
    assert_eq!(second.read().count, None);
    assert_eq!(second.read().payload, None);

    // Measurement has no identity cache, the row is read into a new object
    let found = connection
        .select_one::<Measurement>(SCHEMA, &equals("label", "first"))
        .await
        .expect("Failed to query the first measurement")
        .expect("Expected exactly one measurement labeled `first`");
    {
        let found = found.read();
        assert_eq!(found.id, 1);
        assert!(found.active);
        assert_eq!(found.count, Some(777));
        assert_eq!(found.ratio, 0.25);
        assert_eq!(found.amount, Some(Decimal::new(123456, 2)));
        assert_eq!(found.day, date!(2024 - 02 - 29));
        assert_eq!(found.at, Some(time!(12:00:10)));
        assert_eq!(found.recorded, datetime!(2024-02-29 23:59:59));
        assert_eq!(found.token, Some(token));
        assert_eq!(found.payload.as_deref(), Some([1, 2, 3].as_slice()));
    }

    let found = connection
        .select_one::<Measurement>(SCHEMA, &equals("id", 2))
        .await
        .expect("Failed to query the second measurement")
        .expect("Expected exactly one measurement with id 2");
    {
        let found = found.read();
        assert_eq!(found.label, "second");
        assert!(!found.active);
        assert_eq!(found.ratio, -1.5);
        assert_eq!(found.amount, None);
        assert_eq!(found.at, None);
        assert_eq!(found.token, None);
    }

    {
        let mut first = first.write();
        first.label = "Renamed".into();
        first.count = None;
    }
    let result = connection
        .update(SCHEMA, &first)
        .await
        .expect("Failed to update the first measurement");
    assert_eq!(result.rows_affected, 1);

    let renamed = connection
        .select::<Measurement>(SCHEMA, &like("label", "ren%"))
        .await
        .expect("Failed to query by pattern");
    assert_eq!(renamed.len(), 1);
    assert_eq!(renamed[0].read().id, 1);
    assert_eq!(renamed[0].read().count, None);

    let old = connection
        .select::<Measurement>(
            SCHEMA,
            &between("day", date!(1990 - 01 - 01), date!(2000 - 01 - 01)),
        )
        .await
        .expect("Failed to query by range");
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].read().label, "second");

    // Both bounds are included
    let mut days: Vec<_> = connection
        .select::<Measurement>(
            SCHEMA,
            &between("day", date!(1999 - 12 - 31), date!(2024 - 02 - 29)),
        )
        .await
        .expect("Failed to query by an inclusive range")
        .iter()
        .map(|v| v.read().day)
        .collect();
    days.sort();
    assert_eq!(days, [date!(1999 - 12 - 31), date!(2024 - 02 - 29)]);
    let inside = connection
        .select::<Measurement>(
            SCHEMA,
            &between("day", date!(2000 - 01 - 01), date!(2024 - 02 - 28)),
        )
        .await
        .expect("Failed to query by a narrower range");
    assert!(inside.is_empty());
    let single = connection
        .select::<Measurement>(
            SCHEMA,
            &between("day", date!(2024 - 02 - 29), date!(2024 - 02 - 29)),
        )
        .await
        .expect("Failed to query by a single day range");
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].read().id, 1);

    let no_count = connection
        .select::<Measurement>(SCHEMA, &is_null("count"))
        .await
        .expect("Failed to query null counts");
    assert_eq!(no_count.len(), 2);
    let with_token = connection
        .select::<Measurement>(SCHEMA, &not(is_null("token")))
        .await
        .expect("Failed to query non null tokens");
    assert_eq!(with_token.len(), 1);

    // A null test and its negation split the table in two
    let all = connection
        .select_all::<Measurement>(SCHEMA)
        .await
        .expect("Failed to query all measurements");
    for column in ["count", "token", "amount", "at"] {
        let nulls = connection
            .select::<Measurement>(SCHEMA, &is_null(column))
            .await
            .expect("Failed to query null values");
        let values = connection
            .select::<Measurement>(SCHEMA, &not(is_null(column)))
            .await
            .expect("Failed to query non null values");
        let mut ids: Vec<i64> = nulls.iter().chain(&values).map(|v| v.read().id).collect();
        ids.sort();
        assert_eq!(ids, [1, 2], "Null split of `{}`", column);
        assert_eq!(nulls.len() + values.len(), all.len());
    }
    let no_token = connection
        .select::<Measurement>(SCHEMA, &is_null("token"))
        .await
        .expect("Failed to query null tokens");
    assert_eq!(no_token.len(), 1);
    assert_eq!(no_token[0].read().id, 2);
    assert_eq!(with_token[0].read().id, 1);

    let listed = connection
        .select::<Measurement>(SCHEMA, &in_list("label", ["second", "missing"]))
        .await
        .expect("Failed to query a list of labels");
    assert_eq!(listed.len(), 1);
    let none = connection
        .select::<Measurement>(SCHEMA, &in_list("label", Vec::<String>::new()))
        .await
        .expect("Failed to query an empty list of labels");
    assert!(none.is_empty());

    let result = connection
        .delete_where::<Measurement>(SCHEMA, &equals("active", false))
        .await
        .expect("Failed to delete the inactive measurements");
    assert_eq!(result.rows_affected, 1);
    assert_eq!(
        connection
            .select_all::<Measurement>(SCHEMA)
            .await
            .expect("Failed to query all measurements")
            .len(),
        1
    );
    connection
        .delete_all::<Measurement>(SCHEMA)
        .await
        .expect("Failed to delete all measurements");
    assert!(
        connection
            .select_all::<Measurement>(SCHEMA)
            .await
            .expect("Failed to query all measurements")
            .is_empty()
    );

    connection
        .drop_table::<Measurement>(SCHEMA)
        .await
        .expect("Failed to drop the Measurement table");
}
