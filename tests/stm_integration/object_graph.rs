//! Object Graph Tests
//!
//! Linked objects survive commit and reload, cycles are stored once per
//! object, and objects cannot migrate between transactions.

use crate::*;

fn name(person: &Tracked<Person>) -> String {
    person.get().name.clone()
}

fn friend_of(txn: &mut Transaction, person: &Tracked<Person>) -> StmResult<Option<Tracked<Person>>> {
    let link = person.get().friend.clone();
    link.resolve(txn)
}

#[test]
fn test_linked_objects_round_trip() {
    let stm = create_stm();
    let alice = stm
        .atomically(|txn| {
            let alice = Person::new("alice");
            let bob = Person::new("bob");
            let carol = Person::new("carol");
            bob.update(|p| p.friend = Link::to(&carol));
            alice.update(|p| p.friend = Link::to(&bob));
            txn.attach_as_root(&alice)
        })
        .unwrap();
    // One version for all three objects.
    assert_eq!(stm.version(), Version::new(1));

    let names = stm
        .atomically(|txn| {
            let mut names = Vec::new();
            let mut next = Some(txn.load::<Person>(alice)?);
            while let Some(person) = next {
                names.push(name(&person));
                next = friend_of(txn, &person)?;
            }
            Ok(names)
        })
        .unwrap();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

#[test]
fn test_cycle_is_stored_once_and_reloads_to_same_instances() {
    let stm = create_stm();
    let mut txn = stm.start_transaction();
    let a = Person::new("a");
    let b = Person::new("b");
    a.update(|p| p.friend = Link::to(&b));
    b.update(|p| p.friend = Link::to(&a));
    let handle = txn.attach_as_root(&a).unwrap();
    assert_eq!(stm.commit(&mut txn).unwrap(), 2);
    a.update(|p| p.friend = Link::null());

    stm.atomically(|txn| {
        let a = txn.load::<Person>(handle)?;
        let b = friend_of(txn, &a)?.expect("a has a friend");
        let back = friend_of(txn, &b)?.expect("b has a friend");
        assert_eq!(name(&b), "b");
        assert!(Tracked::ptr_eq(&a, &back));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_self_reference() {
    let stm = create_stm();
    let mut txn = stm.start_transaction();
    let narcissus = Person::new("narcissus");
    narcissus.update(|p| p.friend = Link::to(&narcissus));
    let handle = txn.attach_as_root(&narcissus).unwrap();
    assert_eq!(stm.commit(&mut txn).unwrap(), 1);
    narcissus.update(|p| p.friend = Link::null());

    let mut txn = stm.start_transaction();
    let loaded = txn.load::<Person>(handle).unwrap();
    assert_eq!(loaded.get().friend.handle(), handle);
    let friend = friend_of(&mut txn, &loaded).unwrap().unwrap();
    assert!(Tracked::ptr_eq(&loaded, &friend));
}

#[test]
fn test_new_object_linked_from_stored_object_is_attached_on_commit() {
    let stm = create_stm();
    let alice = stm
        .atomically(|txn| txn.attach_as_root(&Person::new("alice")))
        .unwrap();

    stm.atomically(|txn| {
        let person = txn.load::<Person>(alice)?;
        person.update(|p| p.friend = Link::to(&Person::new("dave")));
        Ok(())
    })
    .unwrap();

    let friend = stm
        .atomically(|txn| {
            let person = txn.load::<Person>(alice)?;
            Ok(friend_of(txn, &person)?.map(|f| (f.handle(), name(&f))))
        })
        .unwrap()
        .unwrap();
    assert!(!friend.0.is_null());
    assert_eq!(friend.1, "dave");
}

#[test]
fn test_objects_cannot_move_between_transactions() {
    let stm = create_stm();
    let handle = open_account(&stm, 1);

    let mut first = stm.start_transaction();
    let mut second = stm.start_transaction();
    let account = first.load::<Account>(handle).unwrap();
    let err = second.attach_as_root(&account).unwrap_err();
    assert!(matches!(err, StmError::BadTransactionState { .. }));

    let fresh = Tracked::new(Account { balance: 2 });
    first.attach_as_root(&fresh).unwrap();
    assert!(matches!(
        second.delete(&fresh),
        Err(StmError::BadTransactionState { .. })
    ));
}

#[test]
fn test_delete_leaves_tombstone() {
    let stm = create_stm();
    let handle = open_account(&stm, 1);

    stm.atomically(|txn| {
        let account = txn.load::<Account>(handle)?;
        txn.delete(&account)
    })
    .unwrap();

    let err = stm
        .atomically(|txn| txn.load::<Account>(handle).map(|_| ()))
        .unwrap_err();
    assert_eq!(err, StmError::ObjectDeleted { handle });

    let never = Handle::new(handle.as_u64() + 1_000);
    let err = stm
        .atomically(|txn| txn.load::<Account>(never).map(|_| ()))
        .unwrap_err();
    assert!(matches!(err, StmError::NoSuchObject { .. }));
}

#[test]
fn test_wrong_type_is_rejected() {
    let stm = create_stm();
    let handle = open_account(&stm, 1);
    let err = stm
        .atomically(|txn| txn.load::<Person>(handle).map(|_| ()))
        .unwrap_err();
    assert!(matches!(err, StmError::InvalidArgument(_)));
}
