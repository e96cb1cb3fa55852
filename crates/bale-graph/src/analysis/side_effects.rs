//! Conservative statement-level side-effect detection.
//!
//! A statement is pure when evaluating it can only create bindings: function
//! and class declarations without effectful static parts, and variable
//! declarations whose initializers are literals, functions or other pure
//! expressions. Everything else (calls, assignments, `new`, property access on
//! unknown objects, destructuring) counts as a side effect, and so does reading
//! a name no scope declares, since that read throws a `ReferenceError`.

use oxc_ast::ast::{
    ArrayExpressionElement, Class, ClassElement, Declaration, ExportDefaultDeclarationKind,
    Expression, ObjectPropertyKind, Statement,
};
use rustc_hash::FxHashSet;

/// Globals that always exist and can be read freely.
const KNOWN_GLOBALS: &[&str] = &["undefined", "NaN", "Infinity"];

/// Side-effect queries for the statements of one module.
pub struct SideEffects<'a> {
    /// Names referenced without a declaration in the module.
    globals: &'a FxHashSet<String>,
}

impl<'a> SideEffects<'a> {
    pub fn new(globals: &'a FxHashSet<String>) -> Self {
        Self { globals }
    }

    pub fn statement(&self, stmt: &Statement<'_>) -> bool {
        match stmt {
            Statement::ImportDeclaration(_)
            | Statement::ExportAllDeclaration(_)
            | Statement::EmptyStatement(_) => false,
            Statement::ExportNamedDeclaration(decl) => decl
                .declaration
                .as_ref()
                .is_some_and(|decl| self.declaration(decl)),
            Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(_) => false,
                ExportDefaultDeclarationKind::ClassDeclaration(class) => self.class(class),
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => false,
                other => other.as_expression().is_some_and(|e| !self.is_pure(e)),
            },
            _ => match stmt.as_declaration() {
                Some(decl) => self.declaration(decl),
                None => true,
            },
        }
    }

    pub fn declaration(&self, decl: &Declaration<'_>) -> bool {
        match decl {
            Declaration::VariableDeclaration(var) => var.declarations.iter().any(|d| {
                d.id.get_identifier_name().is_none()
                    || d.init.as_ref().is_some_and(|init| !self.is_pure(init))
            }),
            Declaration::FunctionDeclaration(_) => false,
            Declaration::ClassDeclaration(class) => self.class(class),
            Declaration::TSTypeAliasDeclaration(_) | Declaration::TSInterfaceDeclaration(_) => false,
            // Enums and namespaces compile to code that runs.
            _ => true,
        }
    }

    pub fn class(&self, class: &Class<'_>) -> bool {
        if !class.decorators.is_empty() {
            return true;
        }
        if class.super_class.as_ref().is_some_and(|sup| !self.is_pure(sup)) {
            return true;
        }
        class.body.body.iter().any(|element| match element {
            ClassElement::StaticBlock(_) => true,
            ClassElement::MethodDefinition(method) => method.computed || !method.decorators.is_empty(),
            ClassElement::PropertyDefinition(prop) => {
                prop.computed
                    || !prop.decorators.is_empty()
                    || (prop.r#static && prop.value.as_ref().is_some_and(|v| !self.is_pure(v)))
            }
            ClassElement::AccessorProperty(prop) => {
                prop.computed
                    || (prop.r#static && prop.value.as_ref().is_some_and(|v| !self.is_pure(v)))
            }
            ClassElement::TSIndexSignature(_) => false,
        })
    }

    pub fn is_pure(&self, expr: &Expression<'_>) -> bool {
        match expr {
            Expression::BooleanLiteral(_)
            | Expression::NullLiteral(_)
            | Expression::NumericLiteral(_)
            | Expression::BigIntLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::RegExpLiteral(_)
            | Expression::FunctionExpression(_)
            | Expression::ArrowFunctionExpression(_) => true,
            Expression::Identifier(ident) => {
                let name = ident.name.as_str();
                KNOWN_GLOBALS.contains(&name) || !self.globals.contains(name)
            }
            Expression::TemplateLiteral(tpl) => tpl.expressions.iter().all(|e| self.is_pure(e)),
            Expression::ClassExpression(class) => !self.class(class),
            Expression::ObjectExpression(obj) => obj.properties.iter().all(|prop| match prop {
                ObjectPropertyKind::ObjectProperty(prop) => !prop.computed && self.is_pure(&prop.value),
                ObjectPropertyKind::SpreadProperty(_) => false,
            }),
            Expression::ArrayExpression(arr) => arr.elements.iter().all(|el| match el {
                ArrayExpressionElement::SpreadElement(_) => false,
                ArrayExpressionElement::Elision(_) => true,
                other => other.as_expression().is_some_and(|e| self.is_pure(e)),
            }),
            Expression::UnaryExpression(unary) => match unary.operator.as_str() {
                "delete" => false,
                // `typeof` never throws on an undeclared name.
                "typeof" if matches!(unary.argument, Expression::Identifier(_)) => true,
                _ => self.is_pure(&unary.argument),
            },
            Expression::ParenthesizedExpression(paren) => self.is_pure(&paren.expression),
            Expression::SequenceExpression(seq) => seq.expressions.iter().all(|e| self.is_pure(e)),
            Expression::ConditionalExpression(cond) => {
                self.is_pure(&cond.test) && self.is_pure(&cond.consequent) && self.is_pure(&cond.alternate)
            }
            Expression::LogicalExpression(logical) => {
                self.is_pure(&logical.left) && self.is_pure(&logical.right)
            }
            Expression::BinaryExpression(binary) => {
                self.is_pure(&binary.left) && self.is_pure(&binary.right)
            }
            _ => false,
        }
    }
}
