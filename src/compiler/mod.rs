//! The layered fixed-point compiler.
//!
//! Parts are asked for fragments, fragments are sorted into buckets by
//! dependency depth, and the shallowest bucket is resolved into one SELECT.
//! When deeper buckets remain, that SELECT becomes the derived source of the
//! next layer, parts are simplified against the columns it exposes, and the
//! whole process starts over.

mod fragment;

pub use fragment::{Fragment, FragmentContext, FragmentKind, ProjectedColumn, Projection};

use tracing::{debug, trace};

use crate::aggregate::Target;
use crate::cube::{Aggregator, Cube, Part};
use crate::error::{CubeError, CubeResult};
use crate::sql::expr::{avg, sum, table_col, Expr};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, Source, TableRef};

/// Column carrying the fact count from one layer to the next.
pub const FACT_COUNT_COLUMN: &str = "__fact_count";

/// A fragment placed in a depth bucket, with the number of fragments that
/// reference it.
#[derive(Debug)]
struct Node {
    fragment: Fragment,
    refcount: usize,
}

/// A column of the SELECT being built.
#[derive(Debug, Clone)]
struct Column {
    name: String,
    expr: Expr,
    aggregated: Option<Aggregator>,
}

/// Compile `parts`, already adapted to `target`, into one SQL query.
pub fn compile(
    cube: &Cube,
    target: &Target<'_>,
    parts: &[Part],
    limit: Option<u64>,
    offset: Option<u64>,
) -> CubeResult<Query> {
    let source = target.source_table(cube).to_string();
    let mut projection = Projection::base();
    let mut ctx = FragmentContext {
        fact_count: target.fact_count(cube),
    };
    let mut query = Query::new().from(TableRef::new(&source));
    let mut present = vec![source];
    let mut parts: Vec<Part> = parts.to_vec();
    let max_layers = cube.settings.max_layers;

    for layer in 0.. {
        if layer >= max_layers {
            return Err(CubeError::NonConvergent { layers: max_layers });
        }

        parts = parts.iter().map(|p| p.simplify(&projection)).collect();
        let tops = parts
            .iter()
            .map(|p| {
                Ok(p.fragments(&ctx)?
                    .into_iter()
                    .map(|f| trim(f, &projection))
                    .collect::<Vec<_>>())
            })
            .collect::<CubeResult<Vec<_>>>()?;

        let requested: Vec<String> = tops
            .iter()
            .flatten()
            .filter(|f| !f.constant)
            .filter_map(|f| f.name.clone())
            .collect();

        let buckets = bucketize(tops.iter().flatten());
        let last = buckets.len() == 1;
        debug!(layer, buckets = buckets.len(), "compiling layer");

        let bucket: Vec<&Fragment> = buckets[0].iter().map(|n| &n.fragment).collect();
        let grouped = bucket.iter().any(|f| f.is_aggregate());

        let mut tables: Vec<String> = Vec::new();
        for f in &bucket {
            for t in &f.joins {
                if !tables.contains(t) {
                    tables.push(t.clone());
                }
            }
        }
        query = cube.catalog.extend_joins(query, &mut present, &tables)?;

        let mut columns: Vec<Column> = Vec::new();
        let mut group_by: Vec<Expr> = Vec::new();
        let mut orders: Vec<OrderByExpr> = Vec::new();

        let kind_order: [&[FragmentKind]; 4] = [
            &[FragmentKind::Id, FragmentKind::Label],
            &[FragmentKind::Value],
            &[FragmentKind::Window],
            &[FragmentKind::Aggregate],
        ];
        for kinds in kind_order {
            for f in bucket.iter().filter(|f| kinds.contains(&f.kind)) {
                let Some(name) = &f.name else { continue };
                if f.constant {
                    continue;
                }
                let expr = match f.kind {
                    FragmentKind::Value if grouped => reaggregate(f),
                    _ => f.expr.clone(),
                };
                push_column(
                    &mut columns,
                    Column {
                        name: name.clone(),
                        expr,
                        aggregated: f.aggregated.clone(),
                    },
                );

                if grouped {
                    match f.kind {
                        FragmentKind::Id | FragmentKind::Label => {
                            push_unique(&mut group_by, f.expr.clone())
                        }
                        FragmentKind::Window => {
                            for dep in f.deps.iter().filter(|d| !d.constant && !d.is_aggregate()) {
                                push_unique(&mut group_by, dep.expr.clone());
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        for f in &bucket {
            match f.kind {
                FragmentKind::Filter | FragmentKind::PostFilter => {
                    query = query.filter(f.expr.clone());
                }
                FragmentKind::Order => orders.push(if f.descending {
                    OrderByExpr::desc(f.expr.clone())
                } else {
                    OrderByExpr::asc(f.expr.clone())
                }),
                _ => {}
            }
        }

        let mut carried_fact_count = false;
        if !last {
            if let Some(fc) = &ctx.fact_count {
                columns.push(Column {
                    name: FACT_COUNT_COLUMN.to_string(),
                    expr: if grouped { sum(fc.clone()) } else { fc.clone() },
                    aggregated: None,
                });
                carried_fact_count = true;
            }
        }

        let mut needed: Vec<String> = requested;
        for node in buckets[1..].iter().flatten() {
            node.fragment.dep_names(&mut needed);
        }
        columns.retain(|c| c.name == FACT_COUNT_COLUMN || needed.contains(&c.name));

        // level keys sorted on stay grouped even when not selected
        let order_keys: Vec<&Expr> = bucket
            .iter()
            .filter(|f| f.kind == FragmentKind::Order)
            .flat_map(|f| &f.deps)
            .filter(|d| d.is_key())
            .map(|d| &d.expr)
            .collect();
        group_by.retain(|g| columns.iter().any(|c| &c.expr == g) || order_keys.contains(&g));
        trace!(
            layer,
            grouped,
            columns = ?columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "kept columns"
        );

        query.select = columns
            .iter()
            .map(|c| SelectExpr::new(c.expr.clone()).with_alias(&c.name))
            .collect();
        query = query.group_by(group_by);

        if last {
            query = query.order_by(orders);
            if let Some(n) = limit {
                query = query.limit(n);
            }
            if let Some(n) = offset {
                query = query.offset(n);
            }
            return Ok(query);
        }

        let alias = format!("anon_{}", layer + 1);
        projection = Projection {
            source: alias.clone(),
            columns: columns
                .iter()
                .map(|c| ProjectedColumn {
                    name: c.name.clone(),
                    aggregated: c.aggregated.clone(),
                })
                .collect(),
        };
        ctx = FragmentContext {
            fact_count: carried_fact_count.then(|| table_col(&alias, FACT_COUNT_COLUMN)),
        };

        // row filters resolved in this layer are not applied again
        let mut resolved = tops.iter().map(|fragments| {
            fragments.first().map_or(false, |f| f.depth() == 0)
        });
        parts.retain(|p| !(resolved.next().unwrap_or(false) && p.is_filter()));

        query = Query::new().from(Source::derived(query, &alias));
        present = vec![alias];
    }

    Err(CubeError::NonConvergent { layers: max_layers })
}

/// Drop dependencies already exposed by the previous layer. Keys an order
/// sorts on are kept so a grouped layer still groups by them.
fn trim(mut fragment: Fragment, projection: &Projection) -> Fragment {
    let order = fragment.kind == FragmentKind::Order;
    fragment.deps = std::mem::take(&mut fragment.deps)
        .into_iter()
        .filter(|d| {
            d.is_aggregate()
                || (order && d.is_key())
                || !d.name.as_deref().is_some_and(|n| projection.contains(n))
        })
        .map(|d| trim(d, projection))
        .collect();
    fragment
}

/// Sort fragments, dependencies first, into buckets by depth. Identical
/// fragments are merged and counted. Orders always land in the last bucket.
fn bucketize<'f>(fragments: impl Iterator<Item = &'f Fragment>) -> Vec<Vec<Node>> {
    let mut buckets: Vec<Vec<Node>> = vec![Vec::new()];
    let mut orders: Vec<&Fragment> = Vec::new();

    for f in fragments {
        if f.kind == FragmentKind::Order {
            for dep in &f.deps {
                visit(dep, &mut buckets);
            }
            orders.push(f);
        } else {
            visit(f, &mut buckets);
        }
    }

    let last = buckets.len() - 1;
    for order in orders {
        place(order, last, &mut buckets);
    }

    for bucket in &mut buckets {
        bucket.sort_by(|a, b| b.refcount.cmp(&a.refcount));
    }
    buckets
}

fn visit(fragment: &Fragment, buckets: &mut Vec<Vec<Node>>) {
    for dep in &fragment.deps {
        visit(dep, buckets);
    }
    place(fragment, fragment.depth(), buckets);
}

fn place(fragment: &Fragment, depth: usize, buckets: &mut Vec<Vec<Node>>) {
    while buckets.len() <= depth {
        buckets.push(Vec::new());
    }
    match buckets[depth].iter_mut().find(|n| n.fragment == *fragment) {
        Some(node) => node.refcount += 1,
        None => buckets[depth].push(Node {
            fragment: fragment.clone(),
            refcount: 1,
        }),
    }
}

/// A plain value selected in a grouped layer: re-apply the aggregator that
/// produced it, or average it when unknown.
fn reaggregate(fragment: &Fragment) -> Expr {
    let expr = fragment.expr.clone();
    match &fragment.aggregated {
        Some(Aggregator::Count) | Some(Aggregator::CountDistinct) => sum(expr),
        Some(agg) if !agg.is_identity() => agg.apply(expr, None),
        _ => avg(expr),
    }
}

fn push_column(columns: &mut Vec<Column>, column: Column) {
    match columns.iter_mut().find(|c| c.name == column.name) {
        Some(existing) => *existing = column,
        None => columns.push(column),
    }
}

fn push_unique(exprs: &mut Vec<Expr>, expr: Expr) {
    if !exprs.contains(&expr) {
        exprs.push(expr);
    }
}
