#[cfg(test)]
mod tests {
    use crate::*;

    fn check_src(source: &str) -> Result<Program, SableError> {
        crate::check("test.sable", source)
    }

    fn check_ok(source: &str) -> Program {
        match check_src(source) {
            Ok(program) => program,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    fn check_err(source: &str) -> String {
        match check_src(source) {
            Ok(_) => panic!("expected a type error, got none"),
            Err(SableError::TypeCheck(e)) => e.message,
            Err(e) => panic!("expected a type error, got: {}", e),
        }
    }

    fn result_type(source: &str) -> String {
        check_ok(source)
            .result_type()
            .expect("validated program has a result type")
            .to_string()
    }

    // ── Basic expressions ────────────────────────────────────────

    #[test]
    fn literal_types() {
        assert_eq!(result_type("return 1"), "Number");
        assert_eq!(result_type("return true"), "Boolean");
        assert_eq!(result_type("return 12n"), "BigInteger");
        assert_eq!(result_type("return null"), "Null");
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(result_type("val x = 1 + 2 * 3 return x"), "Number");
        assert_eq!(result_type("return 10n // 3n"), "BigInteger");
        assert_eq!(result_type("return 1 < 2 and not false"), "Boolean");
        assert_eq!(result_type("return -5"), "Number");
    }

    #[test]
    fn object_literal_and_field() {
        assert_eq!(
            result_type("val p = {x: 1, y: true} return p"),
            "{x: Number, y: Boolean}"
        );
        assert_eq!(result_type("val p = {x: 1, y: true} return p.y"), "Boolean");
    }

    #[test]
    fn declared_value_type_is_used() {
        assert_eq!(result_type("val x: Number? = 1 return x"), "Number?");
        assert_eq!(result_type("val x: Number? = null return x"), "Number?");
    }

    #[test]
    fn shadowing_uses_last_binding() {
        assert_eq!(result_type("val x = 1 val x = true return x"), "Boolean");
    }

    // ── Functions ────────────────────────────────────────────────

    #[test]
    fn function_type_is_inferred_from_body() {
        assert_eq!(
            result_type("def inc(x: Number) = x + 1 return inc"),
            "(x: Number) -> Number"
        );
        assert_eq!(result_type("def inc(x: Number) = x + 1 return inc(2)"), "Number");
    }

    #[test]
    fn block_bodies_see_their_own_declarations() {
        assert_eq!(
            result_type(
                "def area(w: Number, h: Number): Number {
                   val product = w * h
                   return product
                 }
                 return area(2, 3)"
            ),
            "Number"
        );
    }

    #[test]
    fn recursion_with_explicit_return_type() {
        check_ok("def f(n: Number): Boolean = if n == 0 then true else f(n - 1) return f(3)");
    }

    #[test]
    fn recursion_without_return_type_is_rejected() {
        let msg = check_err("def f(n: Number) = if n == 0 then true else f(n - 1) return f(3)");
        insta::assert_snapshot!(msg, @"type determination entered a loop: recursive function 'f' needs an explicit return type");
    }

    #[test]
    fn lambda_type() {
        assert_eq!(
            result_type("val double = fn(x: Number) => x * 2 return double"),
            "(x: Number) -> Number"
        );
        assert_eq!(
            result_type("val id = fn[A](x: A): A => x return id"),
            "[A](x: A) -> A"
        );
    }

    #[test]
    fn closures_capture_outer_values() {
        assert_eq!(
            result_type("val k = 10 def add(x: Number) = x + k return add(1)"),
            "Number"
        );
    }

    #[test]
    fn narrower_function_is_accepted_as_argument() {
        check_ok(
            "def apply(f: (a: Number, b: Number) -> Number): Number = f(1, 2)
             return apply(fn(x: Number) => x)",
        );
    }

    #[test]
    fn vararg_function() {
        assert_eq!(
            result_type("def total(...xs: Number) = xs return total(1, 2, 3)"),
            "List[Number]"
        );
        assert_eq!(result_type("def none(...xs: Number) = 0 return none()"), "Number");
    }

    // ── Generics ─────────────────────────────────────────────────

    #[test]
    fn generic_identity_is_inferred() {
        assert_eq!(
            result_type("def id[A](x: A): A = x return id(true)"),
            "Boolean"
        );
    }

    #[test]
    fn generic_function_passed_to_generic_parameter() {
        assert_eq!(
            result_type(
                "def id[A](x: A): A = x
                 def app(f: [B](x: B) -> B): Number = f(1)
                 return app(id)"
            ),
            "Number"
        );
    }

    #[test]
    fn explicit_type_arguments() {
        assert_eq!(
            result_type("def id[A](x: A): A = x return id[Number](1)"),
            "Number"
        );
    }

    #[test]
    fn generic_alias_instantiates() {
        assert_eq!(
            result_type(
                "type Pair[A] = {first: A, second: A}
                 val p: Pair[Number] = {first: 1, second: 2}
                 return p"
            ),
            "{first: Number, second: Number}"
        );
    }

    #[test]
    fn generic_union_instantiates() {
        assert_eq!(
            result_type(
                "union Option[A] = Some: A | None: Null
                 val o: Option[Number] = 3 # Some
                 return o"
            ),
            "(None: Null | Some: Number)"
        );
    }

    #[test]
    fn nested_generics_with_same_name_do_not_clash() {
        assert_eq!(
            result_type(
                "def outer[A](x: A) = fn[A](y: A): A => y
                 return outer(1)(true)"
            ),
            "Boolean"
        );
    }

    #[test]
    fn error_ambiguous_inference() {
        let msg = check_err("def same[A](x: A, y: A): A = x return same(1, true)");
        insta::assert_snapshot!(msg, @"ambiguous type for type argument A: both Number and Boolean");
    }

    #[test]
    fn error_uninferrable_type_argument() {
        let msg = check_err("def make[A](x: Number): Number = x return make(1)");
        insta::assert_snapshot!(msg, @"could not infer type for type argument A");
    }

    #[test]
    fn error_type_argument_count() {
        let msg = check_err("def id[A](x: A): A = x return id[Number, Boolean](1)");
        insta::assert_snapshot!(msg, @"function 'id' expects 1 type arguments, got 2");
    }

    // ── Unions & tags ────────────────────────────────────────────

    #[test]
    fn tag_and_is() {
        assert_eq!(result_type("val u = 5 # Tag1 return u"), "Number # Tag1");
        assert_eq!(result_type("val u = 5 # Tag1 return u is Tag1"), "Boolean");
        assert_eq!(result_type("val u = 5 # Tag1 return untag u"), "Number");
    }

    #[test]
    fn error_is_with_undeclared_tag() {
        let msg = check_err("val u = 5 # Tag1 return u is Tag2");
        insta::assert_snapshot!(msg, @"invalid tag 'Tag2' for type Number # Tag1");
    }

    #[test]
    fn guard_narrows_then_branch() {
        assert_eq!(
            result_type(
                "union Shape = Circle: Number | Square: Boolean
                 val s: Shape = 2 # Circle
                 return if s is Circle then untag s else 0"
            ),
            "Number"
        );
    }

    #[test]
    fn error_untag_on_wide_union() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Boolean
             val s: Shape = 2 # Circle
             return untag s",
        );
        insta::assert_snapshot!(msg, @"cannot untag a value of type (Circle: Number | Square: Boolean) that is not narrowed to one alternative");
    }

    #[test]
    fn narrowing_does_not_leak_into_else() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Boolean
             val s: Shape = 2 # Circle
             return if s is Circle then 1 else untag s",
        );
        insta::assert_snapshot!(msg, @"cannot untag a value of type (Circle: Number | Square: Boolean) that is not narrowed to one alternative");
    }

    #[test]
    fn branches_of_one_union_agree_on_the_wide_type() {
        assert_eq!(
            result_type(
                "union S = A: Number | B: Boolean
                 val s: S = 1 # A
                 return if s is A then s else s"
            ),
            "(A: Number | B: Boolean)"
        );
        assert_eq!(
            result_type(
                "union S = A: Number | B: Boolean
                 val s: S = 1 # A
                 return match s { A n => if s is A then s else s, B b => s }"
            ),
            "(A: Number | B: Boolean)"
        );
    }

    #[test]
    fn tagged_value_compares_with_its_union() {
        assert_eq!(
            result_type(
                "union S = A: Number | B: Boolean
                 val s: S = 1 # A
                 return s == 1 # A"
            ),
            "Boolean"
        );
    }

    #[test]
    fn error_tag_outside_union_does_not_compare() {
        let msg = check_err(
            "union S = A: Number | B: Boolean
             val s: S = 1 # A
             return s == 1 # C",
        );
        insta::assert_snapshot!(msg, @"operator '==' cannot be applied to (A: Number | B: Boolean) and Number # C");
    }

    #[test]
    fn match_binds_payloads() {
        assert_eq!(
            result_type(
                "union Shape = Circle: Number | Square: Number
                 def area(s: Shape): Number = match s { Circle r => r * r * 3, Square w => w * w }
                 return area(2 # Square)"
            ),
            "Number"
        );
    }

    #[test]
    fn error_non_exhaustive_match() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Number
             val s: Shape = 1 # Circle
             return match s { Circle r => r }",
        );
        insta::assert_snapshot!(msg, @"non-exhaustive match: missing tags: Square");
    }

    #[test]
    fn error_duplicate_match_arm() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Number
             val s: Shape = 1 # Circle
             return match s { Circle r => r, Circle q => q, Square w => w }",
        );
        insta::assert_snapshot!(msg, @"duplicate match arm for tag 'Circle'");
    }

    #[test]
    fn error_match_arm_types_differ() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Number
             val s: Shape = 1 # Circle
             return match s { Circle r => r, Square w => true }",
        );
        insta::assert_snapshot!(msg, @"match arms have different types: Number and Boolean");
    }

    #[test]
    fn error_tag_not_in_union() {
        let msg = check_err(
            "union Shape = Circle: Number | Square: Number
             val s: Shape = 1 # Triangle
             return s",
        );
        insta::assert_snapshot!(msg, @"invalid tag 'Triangle' for type (Circle: Number | Square: Number)");
    }

    // ── Errors ───────────────────────────────────────────────────

    // ── Nullable values ──────────────────────────────────────────

    #[test]
    fn nullable_compares_with_null_and_payload() {
        let prefix = "external def list[A](...items: A): List[A]
                      external def get[A](items: List[A], index: Number): A?
                      val xs = list(1, 2)";
        assert_eq!(
            result_type(&format!("{} return get(xs, 5) == null", prefix)),
            "Boolean"
        );
        assert_eq!(
            result_type(&format!("{} return get(xs, 0) == 1", prefix)),
            "Boolean"
        );
        assert_eq!(result_type("val x: Number? = null return null == x"), "Boolean");
    }

    #[test]
    fn null_check_narrows_else_branch() {
        assert_eq!(
            result_type("val x: Number? = 3 return if x == null then 0 else x + 1"),
            "Number"
        );
        assert_eq!(
            result_type("val x: Number? = 3 return if null == x then 0 else x * 2"),
            "Number"
        );
    }

    #[test]
    fn error_null_check_does_not_narrow_then_branch() {
        let msg = check_err("val x: Number? = 3 return if x == null then x + 1 else 0");
        insta::assert_snapshot!(msg, @"operator '+' cannot be applied to Number? and Number");
    }

    #[test]
    fn error_unrelated_types_do_not_compare() {
        let msg = check_err("return 1 == true");
        insta::assert_snapshot!(msg, @"operator '==' cannot be applied to Number and Boolean");
    }

    #[test]
    fn error_undefined_variable() {
        let msg = check_err("return x + 1");
        insta::assert_snapshot!(msg, @"undefined variable 'x'");
    }

    #[test]
    fn error_arg_type_mismatch() {
        let msg = check_err("def add(x: Number, y: Number) = x + y return add(1, true)");
        insta::assert_snapshot!(msg, @"type mismatch: expected Number, got Boolean");
    }

    #[test]
    fn error_wrong_arg_count() {
        let msg = check_err("def add(x: Number, y: Number) = x + y return add(1)");
        insta::assert_snapshot!(msg, @"function 'add' expects 2 arguments, got 1");
    }

    #[test]
    fn error_if_branch_mismatch() {
        let msg = check_err("return if true then 1 else false");
        insta::assert_snapshot!(msg, @"if branches have different types: Number and Boolean");
    }

    #[test]
    fn error_if_condition_not_boolean() {
        let msg = check_err("return if 1 then 1 else 2");
        insta::assert_snapshot!(msg, @"if condition must be Boolean, got Number");
    }

    #[test]
    fn error_duplicate_argument_names() {
        let msg = check_err("def f(x: Number, x: Number) = x return 1");
        insta::assert_snapshot!(msg, @"duplicate argument name 'x'");
    }

    #[test]
    fn error_declared_type_mismatch() {
        let msg = check_err("val x: Boolean = 1 return x");
        insta::assert_snapshot!(msg, @"type mismatch: expected Boolean, got Number");
    }

    #[test]
    fn error_return_type_mismatch() {
        let msg = check_err("def f(x: Number): Boolean = x return 1");
        insta::assert_snapshot!(msg, @"type mismatch: expected Boolean, got Number");
    }

    #[test]
    fn error_in_uncalled_function_is_reported() {
        let msg = check_err("def f(x: Number) = x + true return 1");
        insta::assert_snapshot!(msg, @"operator '+' cannot be applied to Number and Boolean");
    }

    #[test]
    fn error_big_integer_division() {
        let msg = check_err("return 1n / 2n");
        insta::assert_snapshot!(msg, @"operator '/' cannot be applied to BigInteger and BigInteger");
    }

    #[test]
    fn error_unknown_type() {
        let msg = check_err("val x: Text = 1 return x");
        insta::assert_snapshot!(msg, @"unknown type 'Text'");
    }

    #[test]
    fn error_constructor_arity() {
        let msg = check_err("val x: List[Number, Number] = 1 return x");
        insta::assert_snapshot!(msg, @"type List expects 1 type argument, got 2");
    }

    #[test]
    fn error_missing_field() {
        let msg = check_err("val p = {x: 1} return p.y");
        insta::assert_snapshot!(msg, @"type {x: Number} has no field 'y'");
    }

    #[test]
    fn error_calling_a_number() {
        let msg = check_err("val x = 1 return x(2)");
        insta::assert_snapshot!(msg, @"cannot call a value of type Number");
    }

    #[test]
    fn error_external_without_return_type_fails_to_build() {
        let err = crate::parse("test.sable", "external def f(x: Number) return 1");
        assert!(err.is_err());
    }

    #[test]
    fn parse_errors_are_reported_before_building() {
        let err = check_src("val = 1 return 2").unwrap_err();
        assert!(matches!(err, SableError::Parse(ref errors) if !errors.is_empty()));
    }

    #[test]
    fn error_span_points_at_argument() {
        let source = "def f(x: Number) = x return f(true)";
        let err = match check_src(source) {
            Err(SableError::TypeCheck(e)) => e,
            other => panic!("expected type error, got {:?}", other.map(|_| ())),
        };
        let start = source.find("true").expect("literal present") as u32;
        assert_eq!(err.span.start, start);
        assert_eq!(err.span.end, start + 4);
    }

    #[test]
    fn self_referential_value_is_a_loop() {
        use la_arena::Arena;
        use sable_syntax::Span;

        let mut exprs = Arena::new();
        let mut decls = Arena::new();
        let span = Span::new(0, 1);
        let reference = exprs.alloc(Expression {
            kind: ExpressionKind::Null,
            span,
        });
        let x = decls.alloc(Declaration::Value(ValueDeclaration {
            name: "x".into(),
            span,
            declared_type: None,
            value: reference,
        }));
        exprs[reference].kind = ExpressionKind::Reference {
            name: "x".into(),
            target: Some(ScopedDeclaration::Closed(x)),
        };
        let program = Program::new(
            "test.sable".into(),
            exprs,
            decls,
            FunctionBody {
                declarations: vec![x],
                result: reference,
            },
        );
        let err = program.type_of(reference).unwrap_err();
        insta::assert_snapshot!(err.message, @"type determination entered a loop");
        assert_eq!(err.span, span);
    }

    // ── Property tests ───────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn check_never_panics(source in "[a-z0-9 ()+*=#:\\-]{0,60}") {
                let _ = crate::check("fuzz.sable", &source);
            }

            #[test]
            fn arithmetic_chains_are_numbers(values in prop::collection::vec(0u32..1000, 1..12)) {
                let expr = values
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" + ");
                let source = format!("return {}", expr);
                prop_assert_eq!(result_type(&source), "Number");
            }

            #[test]
            fn validation_is_deterministic(n in 0u32..50) {
                let source = format!("def f(n: Number): Boolean = if n == 0 then true else f(n - 1) return f({})", n);
                let first = check_src(&source).is_ok();
                let second = check_src(&source).is_ok();
                prop_assert!(first && second);
            }
        }
    }
}
