//! End-to-end compilation: from a request spec and a security context to
//! the final parameterized statement.

use std::sync::Arc;

use serde_json::json;
use scopeq_query::{
    FieldDef, FieldType, FilterSpec, OrderSpec, PageSpec, QueryAssembler, QueryError, QuerySpec,
    RelationDef, ResourceAccess, ResourceDefinition, ResourceRegistry, SecurityContext,
};

fn registry() -> Arc<ResourceRegistry> {
    let users = ResourceDefinition::new("users", "users", "u")
        .with_field(FieldDef::typed("id", "u.id", FieldType::Integer))
        .with_field(FieldDef::new("name", "u.name"))
        .with_field(FieldDef::new("email", "u.email"))
        .with_field(FieldDef::new("role", "u.role"))
        .with_field(FieldDef::typed("company_id", "u.company_id", FieldType::Integer))
        .with_field(FieldDef::typed("team_id", "u.team_id", FieldType::Integer))
        .with_field(FieldDef::typed("created_at", "u.created_at", FieldType::Timestamp))
        .with_relation(RelationDef {
            name: "company".to_string(),
            table: "companies".to_string(),
            alias: "c".to_string(),
            on: "u.company_id = c.id".to_string(),
            fields: vec![
                FieldDef::new("company_name", "c.name"),
                FieldDef::new("company_slug", "c.slug"),
            ],
        })
        .with_relation(RelationDef {
            name: "team".to_string(),
            table: "teams".to_string(),
            alias: "t".to_string(),
            on: "u.team_id = t.id".to_string(),
            fields: vec![FieldDef::new("team_name", "t.name")],
        });

    let roles = ResourceDefinition::new("roles", "roles", "r")
        .with_access(ResourceAccess::Public)
        .with_field(FieldDef::typed("id", "r.id", FieldType::Integer))
        .with_field(FieldDef::new("name", "r.name"));

    Arc::new(ResourceRegistry::from_definitions(vec![users, roles]).unwrap())
}

fn assembler() -> QueryAssembler {
    QueryAssembler::new(registry())
}

#[test]
fn email_filter_compiles_to_one_scoped_statement() {
    let spec = QuerySpec::new("users").with_filters(FilterSpec::from([(
        "email.eq".to_string(),
        json!("a@b.com"),
    )]));
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();

    assert!(compiled.statement.starts_with("SELECT "));
    assert!(compiled.statement.contains("FROM users u"));
    assert!(compiled
        .statement
        .ends_with("WHERE u.email = $1 AND u.company_id = $2"));
    assert_eq!(compiled.params, vec![json!("a@b.com"), json!(7)]);
}

#[test]
fn caller_values_appear_only_as_parameters() {
    let hostile = "x' OR 1=1; DROP TABLE users; --";
    let spec = QuerySpec::new("users").with_filters(FilterSpec::from([(
        "email.eq".to_string(),
        json!(hostile),
    )]));
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();

    assert!(!compiled.statement.contains("DROP TABLE"));
    assert!(!compiled.statement.contains(hostile));
    assert_eq!(compiled.params[0], json!(hostile));
}

#[test]
fn tenant_conjunct_survives_caller_filters_on_the_same_column() {
    let spec = QuerySpec::new("users").with_filters(FilterSpec::from([(
        "company_id.eq".to_string(),
        json!(999),
    )]));
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();

    // Both predicates are present and ANDed; the caller's filter can only
    // narrow the injected scope, never replace it.
    assert!(compiled
        .statement
        .contains("u.company_id = $1 AND u.company_id = $2"));
    assert_eq!(compiled.params, vec![json!(999), json!(7)]);
}

#[test]
fn role_list_filter_with_team_context() {
    let spec = QuerySpec::new("users")
        .with_fields(vec!["id".to_string(), "email".to_string()])
        .with_filters(FilterSpec::from([(
            "role.in".to_string(),
            json!(["admin", "ops"]),
        )]));
    let context = SecurityContext::for_company(3).with_teams(vec![5, 9]);
    let compiled = assembler().compile_select(&spec, &context).unwrap();

    assert!(compiled
        .statement
        .starts_with("SELECT u.id AS id, u.email AS email FROM users u"));
    assert!(compiled.statement.ends_with(
        "WHERE u.role IN ($1, $2) AND u.company_id = $3 AND u.team_id IN ($4, $5)"
    ));
    assert_eq!(
        compiled.params,
        vec![json!("admin"), json!("ops"), json!(3), json!(5), json!(9)]
    );
}

#[test]
fn empty_role_list_renders_constant_false_with_scope() {
    let spec = QuerySpec::new("users").with_filters(FilterSpec::from([(
        "role.in".to_string(),
        json!([]),
    )]));
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();
    assert!(compiled.statement.contains("WHERE 1 = 0 AND u.company_id = $1"));
    assert_eq!(compiled.params, vec![json!(7)]);
}

#[test]
fn four_order_fields_fail_before_any_statement_exists() {
    let spec = QuerySpec::new("users").with_order(
        OrderSpec::new()
            .field("id", "asc")
            .field("email", "asc")
            .field("name", "asc")
            .field("created_at", "asc"),
    );
    let err = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap_err();
    assert_eq!(err, QueryError::TooManyOrderFields { count: 4, max: 3 });
}

#[test]
fn recompiling_the_same_spec_is_byte_identical() {
    let spec = QuerySpec::new("users")
        .with_fields(vec!["email".to_string(), "company_name".to_string()])
        .with_filters(FilterSpec::from([
            ("role.in".to_string(), json!(["admin", "ops"])),
            ("email.like".to_string(), json!("%@b.com")),
        ]))
        .with_order(OrderSpec::new().field("id", "desc"))
        .with_pagination(PageSpec::new(10, 0));
    let context = SecurityContext::for_company(3).with_teams(vec![5]);

    let first = assembler().compile_select(&spec, &context).unwrap();
    let second = assembler().compile_select(&spec, &context).unwrap();
    assert_eq!(first, second);
}

#[test]
fn full_pipeline_kitchen_sink() {
    let spec = QuerySpec::new("users")
        .with_fields(vec!["email".to_string(), "company_name".to_string()])
        .with_filters(FilterSpec::from([(
            "team_name.like".to_string(),
            json!("%core%"),
        )]))
        .with_order(
            OrderSpec::new()
                .field("company_name", "desc")
                .field("id", "asc"),
        )
        .with_pagination(PageSpec::new(10, 20));
    let context = SecurityContext::for_company(7).with_teams(vec![1]);
    let compiled = assembler().compile_select(&spec, &context).unwrap();

    assert_eq!(
        compiled.statement,
        "SELECT u.email AS email, c.name AS company_name FROM users u \
         LEFT JOIN companies c ON u.company_id = c.id \
         LEFT JOIN teams t ON u.team_id = t.id \
         WHERE t.name LIKE $1 AND u.company_id = $2 AND u.team_id IN ($3) \
         ORDER BY c.name DESC, u.id ASC LIMIT $4 OFFSET $5"
    );
    assert_eq!(
        compiled.params,
        vec![json!("%core%"), json!(7), json!(1), json!(10), json!(20)]
    );
}

#[test]
fn select_everything_joins_every_declared_relation() {
    let spec = QuerySpec::new("users");
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();
    assert!(compiled.statement.contains("LEFT JOIN companies c ON u.company_id = c.id"));
    assert!(compiled.statement.contains("LEFT JOIN teams t ON u.team_id = t.id"));
    assert!(compiled.statement.contains("c.slug AS company_slug"));
    assert!(compiled.statement.contains("t.name AS team_name"));
}

#[test]
fn public_resource_compiles_without_scope_or_context() {
    let spec = QuerySpec::new("roles");
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::anonymous())
        .unwrap();
    assert_eq!(
        compiled.statement,
        "SELECT r.id AS id, r.name AS name FROM roles r"
    );
    assert!(compiled.params.is_empty());
}

#[test]
fn anonymous_caller_is_rejected_for_tenant_resources() {
    let err = assembler()
        .compile_select(&QuerySpec::new("users"), &SecurityContext::anonymous())
        .unwrap_err();
    assert_eq!(err, QueryError::missing_tenant_context("users"));
}

#[test]
fn unknown_resource_fails_resolution() {
    let err = assembler()
        .compile_select(&QuerySpec::new("invoices"), &SecurityContext::for_company(7))
        .unwrap_err();
    assert_eq!(err, QueryError::unknown_resource("invoices"));
}

#[test]
fn pagination_values_are_bound_not_inlined() {
    let spec = QuerySpec::new("users").with_pagination(PageSpec::new(25, 50));
    let compiled = assembler()
        .compile_select(&spec, &SecurityContext::for_company(7))
        .unwrap();
    assert!(compiled.statement.ends_with("LIMIT $2 OFFSET $3"));
    assert!(!compiled.statement.contains("25"));
    assert!(!compiled.statement.contains("50"));
    assert_eq!(compiled.params, vec![json!(7), json!(25), json!(50)]);
}
