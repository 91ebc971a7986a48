// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use metis_forwarder::{
    core::forwarder::ConfigError,
    processor::fib::{Fib, Nexthop},
};

use super::common;

#[test]
fn longest_prefix_match() {
    let mut fib = Fib::new();
    let a = common::name(&[b"a"]);
    let ab = common::name(&[b"a", b"b"]);
    fib.add_or_update(&a, 1, 1);
    fib.add_or_update(&ab, 2, 1);

    let abc = common::name(&[b"a", b"b", b"c"]);
    assert_eq!(fib.lookup(&abc), &[Nexthop {
        connection_id: 2,
        cost: 1
    }]);

    let ax = common::name(&[b"a", b"x"]);
    assert_eq!(fib.lookup(&ax), &[Nexthop {
        connection_id: 1,
        cost: 1
    }]);

    let unrelated = common::name(&[b"z"]);
    assert!(fib.lookup(&unrelated).is_empty());
}

#[test]
fn nexthops_keep_insertion_order_and_update_cost() {
    let mut fib = Fib::new();
    let prefix = common::name(&[b"foo"]);
    fib.add_or_update(&prefix, 3, 10);
    fib.add_or_update(&prefix, 1, 20);
    fib.add_or_update(&prefix, 3, 5); // cost update, not a duplicate

    let nexthops = fib.lookup(&prefix);
    assert_eq!(nexthops.len(), 2);
    assert_eq!(nexthops[0], Nexthop {
        connection_id: 3,
        cost: 5
    });
    assert_eq!(nexthops[1], Nexthop {
        connection_id: 1,
        cost: 20
    });
}

#[test]
fn remove_prunes_empty_paths() {
    let mut fib = Fib::new();
    let deep = common::name(&[b"a", b"b", b"c"]);
    fib.add_or_update(&deep, 1, 1);

    assert!(fib.remove(&deep, 1));
    assert!(!fib.remove(&deep, 1));
    assert!(fib.list().is_empty());

    // Add-then-remove leaves the table exactly as before.
    let before = fib.list();
    fib.add_or_update(&deep, 4, 2);
    fib.remove(&deep, 4);
    assert_eq!(fib.list(), before);
}

#[test]
fn remove_by_connection_sweeps_all_prefixes() {
    let mut fib = Fib::new();
    let foo = common::name(&[b"foo"]);
    let bar = common::name(&[b"bar"]);
    fib.add_or_update(&foo, 1, 1);
    fib.add_or_update(&foo, 2, 1);
    fib.add_or_update(&bar, 1, 1);

    fib.remove_by_connection(1);

    assert_eq!(fib.lookup(&foo), &[Nexthop {
        connection_id: 2,
        cost: 1
    }]);
    assert!(fib.lookup(&bar).is_empty());
    // The bar path was pruned entirely.
    assert_eq!(fib.list().len(), 1);
}

#[test]
fn list_is_ordered_and_readable() {
    let mut fib = Fib::new();
    fib.add_or_update(&common::name(&[b"zebra"]), 1, 1);
    fib.add_or_update(&common::name(&[b"alpha"]), 1, 1);
    fib.add_or_update(&common::name(&[b"alpha", b"beta"]), 2, 1);

    let rows = fib.list();
    let prefixes: Vec<_> = rows.iter().map(|r| r.prefix.as_str()).collect();
    assert_eq!(prefixes, vec!["lci:/alpha", "lci:/alpha/beta", "lci:/zebra"]);
}

#[test]
fn forwarder_validates_route_operations() {
    let mut forwarder = common::test_forwarder();
    let conn = common::add_conn(&mut forwarder, 1);
    let prefix = common::name(&[b"foo"]);

    assert!(matches!(
        forwarder.add_route(&prefix, conn.id, 0),
        Err(ConfigError::InvalidCost)
    ));
    assert!(matches!(
        forwarder.add_route(&prefix, 999, 1),
        Err(ConfigError::UnknownConnection(999))
    ));
    assert!(forwarder.add_route(&prefix, conn.id, 1).is_ok());
    assert_eq!(forwarder.list_routes().len(), 1);

    assert!(forwarder.remove_route(&prefix, conn.id));
    assert!(forwarder.list_routes().is_empty());
}
