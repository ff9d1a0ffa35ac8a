//! Typed business records bound to process variables
//!
//! A record declares its fields once through [`model!`](crate::model), which
//! generates a table of `(name, getter, setter)` entries used by the binder.

use serde::{de::DeserializeOwned, Serialize};

use crate::CoreError;

/// Reads one field of a record as a JSON value
pub type FieldGetter<T> = fn(&T) -> Result<serde_json::Value, CoreError>;

/// Writes one field of a record from a JSON value
pub type FieldSetter<T> = fn(&mut T, serde_json::Value) -> Result<(), CoreError>;

/// One declared field of a record
pub struct FieldBinding<T> {
    /// Variable name the field is bound to
    pub name: &'static str,
    /// Getter
    pub get: FieldGetter<T>,
    /// Setter
    pub set: FieldSetter<T>,
}

impl<T> std::fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding").field("name", &self.name).finish()
    }
}

/// A typed record that can be bound to a process variable store
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Declared fields of the record, in declaration order
    fn fields() -> Vec<FieldBinding<Self>>;

    /// Names of the declared fields
    fn field_names() -> Vec<&'static str> {
        Self::fields().iter().map(|field| field.name).collect()
    }
}

/// Declare the bound fields of a record type.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Order {
///     customer: String,
///     amount: f64,
/// }
///
/// rill_core::model!(Order { customer, amount });
///
/// use rill_core::Model;
/// assert_eq!(Order::field_names(), vec!["customer", "amount"]);
/// ```
#[macro_export]
macro_rules! model {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Model for $ty {
            fn fields() -> ::std::vec::Vec<$crate::FieldBinding<Self>> {
                ::std::vec![
                    $(
                        $crate::FieldBinding {
                            name: ::std::stringify!($field),
                            get: |record: &Self| {
                                $crate::__private::serde_json::to_value(&record.$field).map_err(|e| {
                                    $crate::CoreError::BindingFault(::std::format!(
                                        "cannot read field {}: {}",
                                        ::std::stringify!($field),
                                        e
                                    ))
                                })
                            },
                            set: |record: &mut Self, value: $crate::__private::serde_json::Value| {
                                record.$field = $crate::__private::serde_json::from_value(value).map_err(|e| {
                                    $crate::CoreError::BindingFault(::std::format!(
                                        "cannot write field {}: {}",
                                        ::std::stringify!($field),
                                        e
                                    ))
                                })?;
                                ::std::result::Result::Ok(())
                            },
                        },
                    )*
                ]
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Approval {
        approver: Option<String>,
        approved: bool,
    }

    crate::model!(Approval { approver, approved });

    #[test]
    fn test_declared_fields() {
        assert_eq!(Approval::field_names(), vec!["approver", "approved"]);
    }

    #[test]
    fn test_getter_and_setter() {
        let mut record = Approval::default();
        let fields = Approval::fields();

        (fields[0].set)(&mut record, json!("mary")).unwrap();
        (fields[1].set)(&mut record, json!(true)).unwrap();

        assert_eq!(record.approver.as_deref(), Some("mary"));
        assert!(record.approved);
        assert_eq!((fields[1].get)(&record).unwrap(), json!(true));
    }

    #[test]
    fn test_setter_type_mismatch_is_binding_fault() {
        let mut record = Approval::default();
        let fields = Approval::fields();

        let err = (fields[1].set)(&mut record, json!("yes")).unwrap_err();
        assert!(matches!(err, CoreError::BindingFault(msg) if msg.contains("approved")));
    }
}
