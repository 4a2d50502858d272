//! Grouped aggregation.
//!
//! `Aggregate` drains its child at open time into an
//! `IntegerAggregator` or `StringAggregator` depending on the
//! aggregated column's type, then serves the computed result set.
//! Aggregation over a single column, grouped by at most one column.

use crate::errors::ExecutionError;
use crate::executor::Executor;
use std::collections::HashMap;
use std::fmt;
use substrate::{Field, StorageError, Tuple, TupleDesc, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{}", name)
    }
}

/// Group key for a tuple: the group-by field, or the `-1` sentinel
/// when there is no grouping.
fn group_key(tuple: &Tuple, gfield: Option<usize>) -> Field {
    match gfield {
        Some(g) => tuple.field(g).clone(),
        None => Field::Int(-1),
    }
}

/// Computes MIN/MAX/SUM/AVG/COUNT over INT columns. Raw values are
/// kept per group; the aggregate is computed when results are built.
pub struct IntegerAggregator {
    gfield: Option<usize>,
    afield: usize,
    op: AggregateOp,
    groups: HashMap<Field, Vec<i32>>,
}

impl IntegerAggregator {
    pub fn new(gfield: Option<usize>, afield: usize, op: AggregateOp) -> Self {
        Self {
            gfield,
            afield,
            op,
            groups: HashMap::new(),
        }
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        let Field::Int(value) = tuple.field(self.afield) else {
            return Err(StorageError::SchemaMismatch.into());
        };
        self.groups
            .entry(group_key(tuple, self.gfield))
            .or_default()
            .push(*value);
        Ok(())
    }

    fn aggregate(&self, values: &[i32]) -> i32 {
        match self.op {
            AggregateOp::Min => values.iter().copied().min().unwrap_or(0),
            AggregateOp::Max => values.iter().copied().max().unwrap_or(0),
            AggregateOp::Sum => values.iter().map(|&v| v as i64).sum::<i64>() as i32,
            AggregateOp::Avg => {
                let sum: i64 = values.iter().map(|&v| v as i64).sum();
                (sum / values.len() as i64) as i32
            }
            AggregateOp::Count => values.len() as i32,
        }
    }

    /// One result tuple per group: `(group, agg)` with grouping, a
    /// single `(agg)` without. Empty input yields no tuples.
    pub fn results(&self, desc: &TupleDesc) -> Result<Vec<Tuple>, ExecutionError> {
        let mut tuples = Vec::with_capacity(self.groups.len());
        for (key, values) in &self.groups {
            let agg = Field::Int(self.aggregate(values));
            let fields = match self.gfield {
                Some(_) => vec![key.clone(), agg],
                None => vec![agg],
            };
            tuples.push(Tuple::new(desc.clone(), fields)?);
        }
        Ok(tuples)
    }
}

/// Counts STRING columns per group. COUNT is the only operator a
/// string column supports; everything else is rejected up front.
pub struct StringAggregator {
    gfield: Option<usize>,
    afield: usize,
    groups: HashMap<Field, i32>,
}

impl StringAggregator {
    pub fn new(
        gfield: Option<usize>,
        afield: usize,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        if op != AggregateOp::Count {
            return Err(ExecutionError::UnsupportedAggregate(format!(
                "{} over a STRING column",
                op
            )));
        }
        Ok(Self {
            gfield,
            afield,
            groups: HashMap::new(),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        let Field::Str(_) = tuple.field(self.afield) else {
            return Err(StorageError::SchemaMismatch.into());
        };
        *self.groups.entry(group_key(tuple, self.gfield)).or_insert(0) += 1;
        Ok(())
    }

    pub fn results(&self, desc: &TupleDesc) -> Result<Vec<Tuple>, ExecutionError> {
        let mut tuples = Vec::with_capacity(self.groups.len());
        for (key, count) in &self.groups {
            let fields = match self.gfield {
                Some(_) => vec![key.clone(), Field::Int(*count)],
                None => vec![Field::Int(*count)],
            };
            tuples.push(Tuple::new(desc.clone(), fields)?);
        }
        Ok(tuples)
    }
}

enum AggregatorImpl {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl AggregatorImpl {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        match self {
            AggregatorImpl::Int(agg) => agg.merge(tuple),
            AggregatorImpl::Str(agg) => agg.merge(tuple),
        }
    }

    fn results(&self, desc: &TupleDesc) -> Result<Vec<Tuple>, ExecutionError> {
        match self {
            AggregatorImpl::Int(agg) => agg.results(desc),
            AggregatorImpl::Str(agg) => agg.results(desc),
        }
    }
}

/// The aggregation operator.
pub struct Aggregate {
    child: Box<dyn Executor>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,
    desc: TupleDesc,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Aggregate {
    /// `afield` is the aggregated column, `gfield` the grouping column
    /// if any. Column types the aggregator set cannot handle are
    /// rejected here, not at execution time.
    pub fn new(
        child: Box<dyn Executor>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        let child_desc = child.schema();
        match child_desc.field_type(afield) {
            Type::Int => {}
            Type::String => {
                if op != AggregateOp::Count {
                    return Err(ExecutionError::UnsupportedAggregate(format!(
                        "{} over a STRING column",
                        op
                    )));
                }
            }
            Type::Double => {
                return Err(ExecutionError::UnsupportedAggregate(format!(
                    "{} over a DOUBLE column",
                    op
                )));
            }
        }

        let agg_name = format!(
            "{}({})",
            op,
            child_desc.field_name(afield).unwrap_or_default()
        );
        let desc = match gfield {
            Some(g) => TupleDesc::new(vec![
                (
                    child_desc.field_type(g),
                    child_desc.field_name(g).map(str::to_string),
                ),
                (Type::Int, Some(agg_name)),
            ]),
            None => TupleDesc::new(vec![(Type::Int, Some(agg_name))]),
        };

        Ok(Self {
            child,
            afield,
            gfield,
            op,
            desc,
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }
}

impl Executor for Aggregate {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        let mut aggregator = match self.child.schema().field_type(self.afield) {
            Type::String => AggregatorImpl::Str(StringAggregator::new(
                self.gfield,
                self.afield,
                self.op,
            )?),
            _ => AggregatorImpl::Int(IntegerAggregator::new(self.gfield, self.afield, self.op)),
        };
        while let Some(tuple) = self.child.next()? {
            aggregator.merge(&tuple)?;
        }
        self.child.close();
        self.results = aggregator.results(&self.desc)?;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        if self.cursor >= self.results.len() {
            return Ok(None);
        }
        let tuple = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.results.clear();
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }
}
