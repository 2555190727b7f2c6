use std::sync::LazyLock;
use tether::{Connection, Executor, Instance, Mapped, Values, equals, not};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Mapped, Debug)]
struct Party {
    #[tether(key)]
    id: Uuid,
    name: String,
    #[tether(read_only)]
    country: Option<String>,
}

#[derive(Mapped, Debug)]
#[tether(name = "Client", table = "clients")]
struct Customer {
    #[tether(parent)]
    party: Party,
    vip: bool,
    #[tether(name = "creditLimit")]
    credit: Option<i64>,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn inheritance<X: Executor>(connection: &mut Connection<X>) {
    let _lock = MUTEX.lock().await;
    const SCHEMA: &str = "crm";

    connection
        .register_identity_cache::<Customer>()
        .expect("Failed to track customers");
    connection
        .drop_table::<Customer>(SCHEMA)
        .await
        .expect("Failed to drop the Customer table");
    connection
        .create_table::<Customer>(SCHEMA)
        .await
        .expect("Failed to create the Customer table");

    let acme_id = Uuid::new_v4();
    let acme = connection
        .insert::<Customer>(
            SCHEMA,
            Values::new()
                .with("id", acme_id)
                .with("name", "Acme")
                .with("country", "IT")
                .with("vip", true)
                .with("creditLimit", 250_000_i64),
        )
        .await
        .expect("Failed to insert Acme");
    let initech = connection
        .insert::<Customer>(
            SCHEMA,
            Values::new()
                .with("id", Uuid::new_v4())
                .with("name", "Initech")
                .with("vip", false),
        )
        .await
        .expect("Failed to insert Initech");
    {
        let acme = acme.read();
        assert_eq!(acme.party.id, acme_id);
        assert_eq!(acme.party.name, "Acme");
        assert_eq!(acme.party.country.as_deref(), Some("IT"));
        assert_eq!(acme.credit, Some(250_000));
    }
    assert_eq!(initech.read().party.country, None);

    // Missing values are sent as nulls and the table rejects them
    assert!(
        connection
            .try_insert::<Customer>(SCHEMA, Values::new().with("name", "Nobody"))
            .await
            .is_none()
    );

    let vip = connection
        .select::<Customer>(SCHEMA, &equals("vip", true))
        .await
        .expect("Failed to query the vip customers");
    assert_eq!(vip.len(), 1);
    assert!(Instance::ptr_eq(&vip[0], &acme));

    let found = connection
        .select_one::<Customer>(SCHEMA, &equals("id", acme_id))
        .await
        .expect("Failed to query Acme by key")
        .expect("Expected Acme to exist");
    assert!(Instance::ptr_eq(&found, &acme));
    let cached = connection
        .lookup::<Customer>(acme_id)
        .expect("Acme is expected to be cached");
    assert!(Instance::ptr_eq(&cached, &acme));

    // Properties of the parent are written like the own ones
    {
        let mut initech = initech.write();
        initech.party.name = "Initrode".into();
        initech.vip = true;
    }
    connection
        .update_properties(SCHEMA, &initech, &["name"])
        .await
        .expect("Failed to rename Initech");
    let renamed = connection
        .select::<Customer>(SCHEMA, &equals("name", "Initrode"))
        .await
        .expect("Failed to query Initrode");
    assert_eq!(renamed.len(), 1);
    assert!(Instance::ptr_eq(&renamed[0], &initech));
    assert!(!initech.read().vip);

    let others = connection
        .select::<Customer>(SCHEMA, &not(equals("name", "Acme")))
        .await
        .expect("Failed to query the other customers");
    assert_eq!(others.len(), 1);

    connection
        .drop_table::<Customer>(SCHEMA)
        .await
        .expect("Failed to drop the Customer table");
}
