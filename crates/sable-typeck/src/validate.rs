use crate::error::TypeCheckError;
use crate::model::*;
use crate::types::ArgumentList;
use std::collections::HashSet;
use tracing::debug;

type Result<T> = std::result::Result<T, TypeCheckError>;

impl Program {
    /// Check the whole program, stopping at the first error.
    ///
    /// Every declaration and every expression (including those inside functions nobody
    /// calls) must have a type, declared types must accept their values, and function
    /// bodies must fit their declared return types.
    pub fn validate(&self) -> Result<()> {
        self.validate_body(&self.body)?;
        debug!(source = %self.source_name, exprs = self.exprs.len(), "program validated");
        Ok(())
    }

    fn validate_body(&self, body: &FunctionBody) -> Result<()> {
        for &declaration in &body.declarations {
            self.validate_declaration(declaration)?;
        }
        self.validate_expr(body.result)
    }

    fn validate_declaration(&self, id: DeclId) -> Result<()> {
        match &self.decls[id] {
            Declaration::Value(v) => {
                self.validate_expr(v.value)?;
                if let Some(declared) = &v.declared_type {
                    let actual = self.type_of(v.value)?;
                    self.check_assignable(&actual, declared, self.exprs[v.value].span)?;
                }
                Ok(())
            }
            Declaration::Function(f) => self.validate_function(&f.signature, f.body.as_ref()),
            Declaration::Parameter(_) | Declaration::Payload(_) => Ok(()),
        }
    }

    fn validate_function(&self, signature: &Signature, body: Option<&FunctionBody>) -> Result<()> {
        if let ArgumentList::Basic(arguments) = &signature.arguments {
            let mut seen = HashSet::new();
            for (argument, &parameter) in arguments.iter().zip(&signature.parameters) {
                if !seen.insert(&argument.name) {
                    return Err(TypeCheckError::new(
                        format!("duplicate argument name '{}'", argument.name),
                        self.decls[parameter].span(),
                    ));
                }
            }
        }
        let Some(body) = body else {
            return Ok(());
        };
        self.validate_body(body)?;
        if let Some(declared) = &signature.return_type {
            let actual = self.type_of(body.result)?;
            self.check_assignable(&actual, declared, self.exprs[body.result].span)?;
        }
        Ok(())
    }

    fn validate_expr(&self, id: ExprId) -> Result<()> {
        self.type_of(id)?;
        match &self.exprs[id].kind {
            ExpressionKind::Number(_)
            | ExpressionKind::BigInteger(_)
            | ExpressionKind::Boolean(_)
            | ExpressionKind::Null
            | ExpressionKind::Reference { .. } => Ok(()),
            ExpressionKind::Object(fields) => {
                fields.iter().try_for_each(|(_, value)| self.validate_expr(*value))
            }
            ExpressionKind::Arithmetic { lhs, rhs, .. }
            | ExpressionKind::Comparison { lhs, rhs, .. }
            | ExpressionKind::Logical { lhs, rhs, .. } => {
                self.validate_expr(*lhs)?;
                self.validate_expr(*rhs)
            }
            ExpressionKind::Negate(operand)
            | ExpressionKind::Not(operand)
            | ExpressionKind::Untag(operand) => self.validate_expr(*operand),
            ExpressionKind::Field { object: value, .. }
            | ExpressionKind::Tag { value, .. }
            | ExpressionKind::Is { value, .. } => self.validate_expr(*value),
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.validate_expr(*condition)?;
                self.validate_expr(*then_branch)?;
                self.validate_expr(*else_branch)
            }
            ExpressionKind::Call {
                callee, arguments, ..
            } => {
                self.validate_expr(*callee)?;
                arguments.iter().try_for_each(|&a| self.validate_expr(a))
            }
            ExpressionKind::Lambda(lambda) => {
                self.validate_function(&lambda.signature, Some(&lambda.body))
            }
            ExpressionKind::Match { scrutinee, arms } => {
                self.validate_expr(*scrutinee)?;
                arms.iter().try_for_each(|arm| self.validate_expr(arm.body))
            }
        }
    }
}
