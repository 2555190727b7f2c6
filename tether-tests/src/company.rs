use rust_decimal::Decimal;
use std::sync::LazyLock;
use tether::{
    Connection, Driver, Instance, Mapped, Values, and, equals, greater, or, references,
    smaller_or_equal,
};
use time::{Date, macros::date};
use tokio::sync::Mutex;

#[derive(Mapped, Debug)]
struct Department {
    #[tether(key, auto_increment)]
    id: i64,
    name: String,
    #[tether(read_only)]
    founded: Date,
}

#[derive(Mapped, Debug)]
struct Employee {
    #[tether(key, auto_increment)]
    id: i64,
    name: String,
    salary: Decimal,
    #[tether(lookup)]
    department: Option<Instance<Department>>,
    #[tether(lookup)]
    mentor: Option<Instance<Employee>>,
    #[tether(transient)]
    _badge: String,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn find<'a>(employees: &'a [Instance<Employee>], name: &str) -> &'a Instance<Employee> {
    employees
        .iter()
        .find(|v| v.read().name == name)
        .unwrap_or_else(|| panic!("Expected employee `{}` in the result", name))
}

pub async fn company<D: Driver>(driver: &D, url: &str, connection: &mut Connection<D::Executor>) {
    let _lock = MUTEX.lock().await;
    const SCHEMA: &str = "company";

    connection
        .register_identity_cache::<Department>()
        .expect("Failed to track departments");
    connection
        .register_identity_cache::<Employee>()
        .expect("Failed to track employees");

    connection
        .drop_table::<Employee>(SCHEMA)
        .await
        .expect("Failed to drop the Employee table");
    connection
        .drop_table::<Department>(SCHEMA)
        .await
        .expect("Failed to drop the Department table");
    connection
        .create_table::<Department>(SCHEMA)
        .await
        .expect("Failed to create the Department table");
    connection
        .create_table::<Employee>(SCHEMA)
        .await
        .expect("Failed to create the Employee table");

    let research = connection
        .insert::<Department>(
            SCHEMA,
            Values::new()
                .with("name", "Research")
                .with("founded", date!(1987 - 04 - 01)),
        )
        .await
        .expect("Failed to insert Research");
    let sales = connection
        .insert::<Department>(
            SCHEMA,
            Values::new()
                .with("name", "Sales")
                .with("founded", date!(2003 - 10 - 15)),
        )
        .await
        .expect("Failed to insert Sales");

    let ada = connection
        .insert::<Employee>(
            SCHEMA,
            Values::new()
                .with("name", "Ada")
                .with("salary", Decimal::new(9200, 0))
                .with_reference("department", &research),
        )
        .await
        .expect("Failed to insert Ada");
    let grace = connection
        .insert::<Employee>(
            SCHEMA,
            Values::new()
                .with("name", "Grace")
                .with("salary", Decimal::new(7150, 0))
                .with_reference("department", &research)
                .with_reference("mentor", &ada),
        )
        .await
        .expect("Failed to insert Grace");
    let linus = connection
        .insert::<Employee>(
            SCHEMA,
            Values::new()
                .with("name", "Linus")
                .with("salary", Decimal::new(4800, 0))
                .with_reference("department", &sales),
        )
        .await
        .expect("Failed to insert Linus");
    assert!(Instance::ptr_eq(
        grace.read().mentor.as_ref().expect("Grace has a mentor"),
        &ada
    ));
    assert!(ada.read()._badge.is_empty());

    let id = research.read().id;
    let cached = connection
        .lookup::<Department>(id)
        .expect("Research is expected to be cached");
    assert!(Instance::ptr_eq(&cached, &research));

    // The same row always gives back the same object
    let researchers = connection
        .select::<Employee>(SCHEMA, &references("department", &research))
        .await
        .expect("Failed to query the researchers");
    assert_eq!(researchers.len(), 2);
    assert!(Instance::ptr_eq(find(&researchers, "Ada"), &ada));
    assert!(Instance::ptr_eq(find(&researchers, "Grace"), &grace));
    for employee in &researchers {
        let employee = employee.read();
        let department = employee
            .department
            .as_ref()
            .expect("Researchers have a department");
        assert!(Instance::ptr_eq(department, &research));
    }

    let well_paid = connection
        .select::<Employee>(SCHEMA, &greater("salary", Decimal::new(5000, 0)))
        .await
        .expect("Failed to query by salary");
    assert_eq!(well_paid.len(), 2);
    let matching = connection
        .select::<Employee>(
            SCHEMA,
            &or([
                equals("name", "Linus"),
                and([
                    references("department", &research),
                    smaller_or_equal("salary", Decimal::new(8000, 0)),
                ]),
            ]),
        )
        .await
        .expect("Failed to query a composite predicate");
    assert_eq!(matching.len(), 2);
    assert!(Instance::ptr_eq(find(&matching, "Linus"), &linus));
    assert!(Instance::ptr_eq(find(&matching, "Grace"), &grace));

    let mentored = connection
        .select::<Employee>(SCHEMA, &references("mentor", &ada))
        .await
        .expect("Failed to query by mentor");
    assert_eq!(mentored.len(), 1);
    assert!(Instance::ptr_eq(&mentored[0], &grace));

    // A session that never saw the referenced rows loads them, and writes the references back
    let mut other = Connection::open(driver, url, connection.registry().clone())
        .await
        .expect("Failed to open a second connection");
    other
        .register_identity_cache::<Department>()
        .expect("Failed to track departments");
    other
        .register_identity_cache::<Employee>()
        .expect("Failed to track employees");
    let (grace_id, research_id, ada_id) = (grace.read().id, research.read().id, ada.read().id);
    let fresh = other
        .select_one::<Employee>(SCHEMA, &equals("id", grace_id))
        .await
        .expect("Failed to query Grace from the second connection")
        .expect("Expected Grace to exist");
    assert!(!Instance::ptr_eq(&fresh, &grace));
    {
        let fresh = fresh.read();
        let department = fresh.department.as_ref().expect("Grace has a department");
        assert_eq!(department.read().id, research_id);
        assert_eq!(department.read().name, "Research");
        let mentor = fresh.mentor.as_ref().expect("Grace has a mentor");
        assert_eq!(mentor.read().id, ada_id);
        assert!(Instance::ptr_eq(
            mentor.read().department.as_ref().expect("Ada has a department"),
            department
        ));
    }
    assert!(other.lookup::<Department>(research_id).is_some());
    assert!(other.lookup::<Employee>(ada_id).is_some());
    fresh.write().salary = Decimal::new(7200, 0);
    other
        .update(SCHEMA, &fresh)
        .await
        .expect("Failed to update Grace from the second connection");
    other
        .close()
        .await
        .expect("Failed to close the second connection");

    // Without a cache the reference stays unresolved and its column is left alone
    let mut untracked = Connection::open(driver, url, connection.registry().clone())
        .await
        .expect("Failed to open a third connection");
    let bare = untracked
        .select_one::<Employee>(SCHEMA, &equals("id", grace_id))
        .await
        .expect("Failed to query Grace from the third connection")
        .expect("Expected Grace to exist");
    assert!(bare.read().department.is_none());
    bare.write().salary = Decimal::new(7150, 0);
    untracked
        .update(SCHEMA, &bare)
        .await
        .expect("Failed to update Grace from the third connection");
    untracked
        .close()
        .await
        .expect("Failed to close the third connection");

    assert_eq!(
        connection
            .select::<Employee>(SCHEMA, &references("department", &research))
            .await
            .expect("Failed to query the researchers")
            .len(),
        2
    );
    let mentored = connection
        .select::<Employee>(SCHEMA, &references("mentor", &ada))
        .await
        .expect("Failed to query by mentor");
    assert_eq!(mentored.len(), 1);
    assert!(Instance::ptr_eq(&mentored[0], &grace));
    assert_eq!(grace.read().salary, Decimal::new(7150, 0));

    // Read-only properties are never written back
    research.write().name = "R&D".into();
    let result = connection
        .update(SCHEMA, &research)
        .await
        .expect("Failed to update Research");
    assert_eq!(result.rows_affected, 1);
    let departments = connection
        .select_all::<Department>(SCHEMA)
        .await
        .expect("Failed to query the departments");
    assert_eq!(departments.len(), 2);
    assert_eq!(research.read().name, "R&D");
    assert_eq!(research.read().founded, date!(1987 - 04 - 01));

    // Only the listed properties are written
    {
        let mut grace = grace.write();
        grace.name = "Grace H.".into();
        grace.salary = Decimal::new(1, 0);
    }
    connection
        .update_properties(SCHEMA, &grace, &["name"])
        .await
        .expect("Failed to update the name of Grace");
    let found = connection
        .select_one::<Employee>(SCHEMA, &equals("name", "Grace H."))
        .await
        .expect("Failed to query Grace")
        .expect("Expected Grace to be renamed");
    assert!(Instance::ptr_eq(&found, &grace));
    // Reading the row refreshes the cached object
    assert_eq!(grace.read().salary, Decimal::new(7150, 0));

    grace.write().mentor = None;
    connection
        .update(SCHEMA, &grace)
        .await
        .expect("Failed to update Grace");
    assert!(
        connection
            .select::<Employee>(SCHEMA, &references("mentor", &ada))
            .await
            .expect("Failed to query by mentor")
            .is_empty()
    );

    let result = connection
        .update_where::<Employee>(
            SCHEMA,
            Values::new().with("salary", Decimal::new(5100, 0)),
            Some(&references("department", &sales)),
        )
        .await
        .expect("Failed to raise the salaries of Sales");
    assert_eq!(result.rows_affected, 1);
    assert_eq!(linus.read().salary, Decimal::new(4800, 0));
    let id = linus.read().id;
    connection
        .select_one::<Employee>(SCHEMA, &equals("id", id))
        .await
        .expect("Failed to query Linus")
        .expect("Expected Linus to exist");
    assert_eq!(linus.read().salary, Decimal::new(5100, 0));

    let result = connection
        .delete(SCHEMA, &linus)
        .await
        .expect("Failed to delete Linus");
    assert_eq!(result.rows_affected, 1);
    let remaining = connection
        .select_all::<Employee>(SCHEMA)
        .await
        .expect("Failed to query the employees");
    assert_eq!(remaining.len(), 2);
    assert!(
        connection
            .select_one::<Employee>(SCHEMA, &equals("name", "Linus"))
            .await
            .expect("Failed to query Linus")
            .is_none()
    );

    let result = connection
        .delete_where::<Employee>(SCHEMA, &references("department", &research))
        .await
        .expect("Failed to delete the researchers");
    assert_eq!(result.rows_affected, 2);

    connection
        .drop_table::<Employee>(SCHEMA)
        .await
        .expect("Failed to drop the Employee table");
    connection
        .drop_table::<Department>(SCHEMA)
        .await
        .expect("Failed to drop the Department table");
}
