//! Translation from docmodel queries and updates to MongoDB syntax.
//!
//! Filters go through [`MongoQueryTranslator`], a [`QueryVisitor`] producing a filter
//! document. Updates, projections and sorts have direct counterparts and are translated
//! by plain functions.

use bson::{Document, Bson, doc};

use docmodel_core::{
    query::{QueryVisitor, Expr, FieldOp, Projection, Sort, SortDirection},
    update::{Update, UpdateOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Translates docmodel query expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates a whole filter; an empty `And` becomes the match-all `{}`.
    pub fn filter(expr: &Expr) -> DocumentStoreResult<Document> {
        MongoQueryTranslator.visit_expr(expr)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to operator expressions, so whole sub-filters are negated with `$nor`.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": format!(".*{}.*", escape_regex(s)) },
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": format!(".*{}.*", escape_regex(s)) } },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                    _ => return Err(DocumentStoreError::Query(format!("`starts_with` on `{field}` requires a string value"))),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                    _ => return Err(DocumentStoreError::Query(format!("`ends_with` on `{field}` requires a string value"))),
                },
                FieldOp::AnyOf => doc! { "$in": value },
                FieldOp::NoneOf => doc! { "$nin": value },
            }
        })
    }
}

/// Translates field mutations into an update document with `$set`, `$unset` and `$inc`.
pub(crate) fn update_document(update: &Update) -> DocumentStoreResult<Document> {
    update.check()?;

    let mut set = Document::new();
    let mut unset = Document::new();
    let mut inc = Document::new();

    for op in update.ops() {
        match op {
            UpdateOp::Set(field, value) => {
                set.insert(field.clone(), value.clone());
            },
            UpdateOp::Unset(field) => {
                unset.insert(field.clone(), "");
            },
            UpdateOp::Inc(field, amount) => {
                inc.insert(field.clone(), amount.clone());
            },
        }
    }

    let mut document = Document::new();

    for (operator, fields) in [("$set", set), ("$unset", unset), ("$inc", inc)] {
        if !fields.is_empty() {
            document.insert(operator, fields);
        }
    }

    Ok(document)
}

pub(crate) fn projection_document(projection: &Projection) -> Document {
    match projection {
        Projection::Include(fields) => fields
            .iter()
            .map(|f| (f.clone(), Bson::Int32(1)))
            .collect(),
        Projection::Exclude(fields) => fields
            .iter()
            .map(|f| (f.clone(), Bson::Int32(0)))
            .collect(),
    }
}

pub(crate) fn sort_document(sort: &Sort) -> Document {
    doc! {
        sort.field.clone(): match sort.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}


#[cfg(test)]
mod tests {
    use super::*;
    use docmodel_core::query::Filter;

    #[test]
    fn empty_and_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(&Filter::all()).unwrap(), doc! {});
    }

    #[test]
    fn combinators_translate() {
        let filter = Filter::eq("author", "Mosh")
            .and(Filter::eq("isPublished", true).not());

        assert_eq!(
            MongoQueryTranslator::filter(&filter).unwrap(),
            doc! {
                "$and": [
                    { "author": { "$eq": "Mosh" } },
                    { "$nor": [{ "isPublished": { "$eq": true } }] },
                ]
            }
        );
    }

    #[test]
    fn string_operators_escape_regex_syntax() {
        assert_eq!(
            MongoQueryTranslator::filter(&Filter::starts_with("name", "Node.js")).unwrap(),
            doc! { "name": { "$regex": "^Node\\.js" } }
        );
    }

    #[test]
    fn updates_group_by_operator() {
        let update = Update::new()
            .set("author", "Jason")
            .set("isPublished", false)
            .unset("tags")
            .inc("price", 5);

        assert_eq!(
            update_document(&update).unwrap(),
            doc! {
                "$set": { "author": "Jason", "isPublished": false },
                "$unset": { "tags": "" },
                "$inc": { "price": 5 },
            }
        );
    }

    #[test]
    fn identifier_updates_never_reach_the_server() {
        assert!(update_document(&Update::new().set("_id", 1)).is_err());
    }

    #[test]
    fn projections_and_sorts() {
        assert_eq!(
            projection_document(&Projection::Include(vec!["name".into(), "author".into()])),
            doc! { "name": 1, "author": 1 }
        );
        assert_eq!(
            sort_document(&Sort { field: "name".into(), direction: SortDirection::Desc }),
            doc! { "name": -1 }
        );
    }
}
