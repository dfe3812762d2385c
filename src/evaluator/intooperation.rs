use crate::Error;
use crate::ast::{NumberType, Value};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// NOTE: This module is plumbing for the evaluator and the builtin
// registry. It turns strongly-typed Rust functions into the erased
// `OperationFn` stored in `Value::BuiltinFunction`.
//
// Hosts normally reach it through `Environment::register_builtin_operation`
// and `Environment::register_variadic_builtin_operation`, naming the
// iterator aliases below in their builtin signatures.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their argument vector, enabling
/// implementations that consume or rearrange arguments if desired.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Fixed-arity argument conversion
// =====================================================================

/// Turns one evaluated argument into a strongly-typed parameter.
///
/// `Param<'a>` is the parameter type as seen by the builtin for the
/// lifetime of the local argument slot, which lets `&str` and the list
/// iterators borrow instead of cloning.
pub trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        // Moving out keeps list identity intact for `=`.
        Ok(std::mem::replace(value, Value::Nil))
    }
}

impl FromParam for NumberType {
    type Param<'a> = NumberType;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::Number(n) => Ok(*n),
            other => Err(expected("number", other)),
        }
    }
}

impl FromParam for bool {
    type Param<'a> = bool;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(expected("boolean", other)),
        }
    }
}

impl FromParam for String {
    type Param<'a> = String;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::String(s) => Ok(std::mem::take(s)),
            other => Err(expected("string", other)),
        }
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::String(s) => Ok(s.as_str()),
            other => Err(expected("string", other)),
        }
    }
}

impl<K> FromParam for TypedValueIter<'_, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::List(items) => TypedValueIter::<K>::new(items.as_slice()),
            other => Err(expected("list", other)),
        }
    }
}

fn expected(tag: &str, found: &Value) -> Error {
    Error::TypeMismatch(format!("expected {tag}, got {} {found}", found.type_name()))
}

// =====================================================================
// Typed iteration over argument slices and list contents
// =====================================================================

/// Describes how to view a `Value` slice as a typed iterator.
/// Implementations validate the whole slice up front, then project
/// each element infallibly.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project(v: &Value) -> Self::Item<'_>;
}

/// Iterator over a slice of `Value`s, typed by a [`ValueElementKind`].
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.inner.next()?;
        Some(K::project(v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> DoubleEndedIterator for TypedValueIter<'_, K>
where
    K: ValueElementKind,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        let v = self.inner.next_back()?;
        Some(K::project(v))
    }
}

impl<K> ExactSizeIterator for TypedValueIter<'_, K> where K: ValueElementKind {}
impl<K> FusedIterator for TypedValueIter<'_, K> where K: ValueElementKind {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project(v: &Value) -> Self::Item<'_> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = NumberType;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, Value::Number(_))) {
            Some(bad) => Err(expected("number", bad)),
            None => Ok(()),
        }
    }

    fn project(v: &Value) -> Self::Item<'_> {
        match v {
            Value::Number(n) => *n,
            _ => {
                debug_assert!(false, "NumberKind::project saw non-number after precheck");
                NumberType::NAN
            }
        }
    }
}

#[doc(hidden)]
pub struct StringKind;

impl ValueElementKind for StringKind {
    type Item<'a> = &'a str;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, Value::String(_))) {
            Some(bad) => Err(expected("string", bad)),
            None => Ok(()),
        }
    }

    fn project(v: &Value) -> Self::Item<'_> {
        match v {
            Value::String(s) => s.as_str(),
            _ => {
                debug_assert!(false, "StringKind::project saw non-string after precheck");
                ""
            }
        }
    }
}

/// Borrowed iterator over raw values (any tag).
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over numbers; a non-number anywhere in the
/// sequence is a `TypeMismatch` before the builtin runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Borrowed iterator over string contents.
pub type StringIter<'a> = TypedValueIter<'a, StringKind>;

// =====================================================================
// Rest-parameter support for variadic operations
// =====================================================================

/// Builds a rest parameter from the unconsumed tail of the arguments.
pub trait FromRest {
    type Param<'a>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation for builtin functions
// =====================================================================

/// Normalizes builtin return types to `Result<Value, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

macro_rules! impl_into_value_result {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoValueResult for $ty {
                fn into_value_result(self) -> Result<Value, Error> {
                    Ok(self.into())
                }
            }

            impl IntoValueResult for Result<$ty, Error> {
                fn into_value_result(self) -> Result<Value, Error> {
                    self.map(Into::into)
                }
            }
        )+
    };
}

impl IntoValueResult for Value {
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self)
    }
}

impl IntoValueResult for Result<Value, Error> {
    fn into_value_result(self) -> Result<Value, Error> {
        self
    }
}

impl_into_value_result!(NumberType, bool, String);

/// Converts a strongly-typed Rust function into the erased
/// [`OperationFn`], parameterized by its argument tuple type.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Like [`IntoOperation`], for functions whose last parameter is one of
/// the iterator types above and receives every remaining argument.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: R = (self)(rest_param);
            result.into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of
/// `FromParam` parameters followed by a single rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + Send
                + Sync
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        [ $( $v ),+, rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: R = (self)( $( $p ),+, rest_param );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error(crate::builtinops::Arity::AtLeast($prefix), len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);
impl_into_variadic_operation_for_prefix_and_rest!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of a given arity: checks the
/// argument count, converts each slot with `FromParam`, then calls.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R
                + Send
                + Sync
                + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        [ $( $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: R = (self)( $( $p ),+ );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error(crate::builtinops::Arity::Exact($arity), len)),
                    }
                })
            }
        }
    };
}

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(
                    crate::builtinops::Arity::Exact(0),
                    args.len(),
                ));
            }

            let result: R = (self)();
            result.into_value_result()
        })
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
impl_into_operation_for_arity!(4, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, val};

    fn fixed<Args, F: IntoOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_operation()
    }

    fn variadic<Args, F: IntoVariadicOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_variadic_operation()
    }

    #[test]
    fn fixed_arity_conversion() {
        fn hypot(a: NumberType, b: NumberType) -> NumberType {
            (a * a + b * b).sqrt()
        }
        let op = fixed::<(NumberType, NumberType), _>(hypot);
        assert_eq!(op(vec![val(3), val(4)]).unwrap(), val(5));

        match op(vec![val(3)]).unwrap_err() {
            Error::ArityError { expected, got, .. } => {
                assert_eq!(expected, crate::builtinops::Arity::Exact(2));
                assert_eq!(got, 1);
            }
            other => panic!("expected ArityError, got {other:?}"),
        }

        let err = op(vec![val(3), val("four")]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(ref msg) if msg.contains("expected number")));
    }

    #[test]
    fn borrowed_string_and_list_params() {
        fn shout(s: &str) -> String {
            s.to_uppercase()
        }
        fn count(items: ValueIter<'_>) -> NumberType {
            items.len() as NumberType
        }

        let shout = fixed::<(&'static str,), _>(shout);
        assert_eq!(shout(vec![val("hi")]).unwrap(), val("HI"));
        assert!(shout(vec![val(1)]).is_err());

        let count = fixed::<(ValueIter<'static>,), _>(count);
        assert_eq!(count(vec![val([1, 2, 3])]).unwrap(), val(3));
        assert_eq!(count(vec![nil()]).unwrap(), val(0));
        assert!(count(vec![val("not a list")]).is_err());
    }

    #[test]
    fn rest_parameters() {
        fn total(nums: NumIter<'_>) -> NumberType {
            nums.sum()
        }
        fn scaled(factor: NumberType, nums: NumIter<'_>) -> Result<NumberType, Error> {
            Ok(factor * nums.sum::<NumberType>())
        }

        let total = variadic::<(NumIter<'static>,), _>(total);
        assert_eq!(total(vec![]).unwrap(), val(0));
        assert_eq!(total(vec![val(1), val(2.5)]).unwrap(), val(3.5));
        assert!(total(vec![val(1), val(true)]).is_err());

        let scaled = variadic::<(NumberType, NumIter<'static>), _>(scaled);
        assert_eq!(scaled(vec![val(2), val(1), val(2)]).unwrap(), val(6));
        assert!(matches!(
            scaled(vec![]).unwrap_err(),
            Error::ArityError { got: 0, .. }
        ));
    }
}
