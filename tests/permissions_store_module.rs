use banhammer::permissions::{
    is_authorized, Actor, OverrideStore, OverrideSubject, SqliteOverrideStore,
};
use banhammer::shared::{RoleId, StatePaths, TenantId, UserId};
use tempfile::tempdir;

fn tenant(raw: &str) -> TenantId {
    TenantId::parse(raw).expect("tenant")
}

fn member(user: &str, roles: &[&str]) -> Actor {
    Actor {
        user_id: UserId::parse(user).expect("user"),
        role_ids: roles
            .iter()
            .map(|role| RoleId::parse(role).expect("role"))
            .collect(),
        is_admin: false,
    }
}

#[test]
fn overrides_survive_reopening_the_database() {
    let dir = tempdir().expect("tempdir");
    let paths = StatePaths::new(dir.path());
    let db = paths.overrides_db_path();

    {
        let store = SqliteOverrideStore::open(&db).expect("open");
        store
            .grant(
                &tenant("1"),
                &OverrideSubject::User(UserId::parse("10").expect("user")),
            )
            .expect("grant user");
        store
            .grant(
                &tenant("1"),
                &OverrideSubject::Role(RoleId::parse("20").expect("role")),
            )
            .expect("grant role");
    }

    let store = SqliteOverrideStore::open(&db).expect("reopen");
    assert_eq!(store.db_path(), db.as_path());
    assert!(is_authorized(&store, &member("10", &[]), &tenant("1")).expect("resolve"));
    assert!(is_authorized(&store, &member("11", &["20"]), &tenant("1")).expect("resolve"));
    assert!(!is_authorized(&store, &member("11", &["21"]), &tenant("1")).expect("resolve"));
    assert!(!is_authorized(&store, &member("10", &[]), &tenant("2")).expect("resolve"));
}

#[test]
fn tenants_are_isolated_and_emptied_records_persist() {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("overrides.sqlite3");
    let store = SqliteOverrideStore::open(&db).expect("open");
    let subject = OverrideSubject::User(UserId::parse("10").expect("user"));

    assert!(store.grant(&tenant("1"), &subject).expect("grant"));
    assert!(store.grant(&tenant("2"), &subject).expect("grant other tenant"));
    assert!(store.revoke(&tenant("1"), &subject).expect("revoke"));

    let reopened = SqliteOverrideStore::open(&db).expect("reopen");
    let emptied = reopened
        .get(&tenant("1"))
        .expect("get")
        .expect("record kept after revoke");
    assert!(emptied.is_empty());
    let other = reopened.get(&tenant("2")).expect("get").expect("record");
    assert!(other.users.contains("10"));
    assert_eq!(reopened.get(&tenant("3")).expect("get"), None);
}
