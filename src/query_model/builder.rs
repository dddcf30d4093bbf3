use super::{
    BodyClause, FromClause, JoinClause, OrderByClause, OrderingDirection, QueryExpr, QueryModel,
    QueryOrdering, ResultOperator, SelectClause, WhereClause,
};

/// Fluent construction of a [`QueryModel`].
///
/// The select clause defaults to the main from clause's items.
#[derive(Debug, Clone)]
pub struct QueryModelBuilder {
    main_from_clause: FromClause,
    body_clauses: Vec<BodyClause>,
    selector: Option<QueryExpr>,
    result_operators: Vec<ResultOperator>,
}

impl QueryModelBuilder {
    pub fn new(main_from_clause: FromClause) -> Self {
        Self {
            main_from_clause,
            body_clauses: vec![],
            selector: None,
            result_operators: vec![],
        }
    }

    pub fn main_source(&self) -> QueryExpr {
        self.main_from_clause.reference()
    }

    pub fn additional_from(mut self, clause: FromClause) -> Self {
        self.body_clauses.push(BodyClause::AdditionalFrom(clause));
        self
    }

    pub fn where_clause(mut self, predicate: QueryExpr) -> Self {
        self.body_clauses
            .push(BodyClause::Where(WhereClause { predicate }));
        self
    }

    pub fn order_by(mut self, expression: QueryExpr, direction: OrderingDirection) -> Self {
        self.body_clauses.push(BodyClause::OrderBy(OrderByClause {
            orderings: vec![QueryOrdering {
                expression,
                direction,
            }],
        }));
        self
    }

    pub fn join(mut self, clause: JoinClause) -> Self {
        self.body_clauses.push(BodyClause::Join(clause));
        self
    }

    pub fn select(mut self, selector: QueryExpr) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn result_operator(mut self, operator: ResultOperator) -> Self {
        self.result_operators.push(operator);
        self
    }

    pub fn build(self) -> QueryModel {
        let selector = self
            .selector
            .unwrap_or_else(|| self.main_from_clause.reference());
        QueryModel {
            main_from_clause: self.main_from_clause,
            body_clauses: self.body_clauses,
            select_clause: SelectClause { selector },
            result_operators: self.result_operators,
        }
    }
}
