//! The call envelope and the parameter codec.
//!
//! An [`ApiParam`] carries a function identifier, its ordered typed
//! arguments, and (after dispatch) the result slot. The codec converts
//! between envelopes and their JSON wire form, and validates argument
//! shapes against the function table before any native call is made.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::function::ApiFunction;
use crate::value::Value;

/// The self-describing request/response record crossing the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiParam {
    /// Function identifier, e.g. `"RtmClient_login"`. Case sensitive.
    pub fun: String,
    /// Ordered typed arguments matching the function's declared shape.
    pub args: Vec<Value>,
    /// Result slot, filled by the dispatch side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CallOutcome>,
}

/// Outcome written into the envelope's result slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Err {
        code: i32,
        reason: String,
    },
}

impl ApiParam {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> String {
        // The envelope type set has no non-serializable states.
        serde_json::to_string(self).expect("envelope serialization cannot fail")
    }

    /// Deserialize from the JSON wire form.
    ///
    /// Truncated or type-tag-mismatched input fails with
    /// [`BridgeError::MalformedEnvelope`].
    pub fn from_json(input: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(input).map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))
    }

    /// Write a success outcome into the result slot.
    pub fn set_ok(&mut self, data: Option<Value>) {
        self.result = Some(CallOutcome::Ok { data });
    }

    /// Write an error outcome into the result slot.
    pub fn set_err(&mut self, err: &BridgeError) {
        self.result = Some(CallOutcome::Err {
            code: err.code(),
            reason: err.to_string(),
        });
    }

    /// Status code of the result slot: `0` for success, the negative error
    /// code for failure. `0` if the envelope has not been dispatched yet.
    pub fn status(&self) -> i32 {
        match &self.result {
            Some(CallOutcome::Err { code, .. }) => *code,
            _ => 0,
        }
    }
}

/// Build a call envelope, validating `args` against the declared shape of
/// `fun`. Fails with [`BridgeError::InvalidArgumentShape`] on mismatch.
pub fn encode_call(fun: ApiFunction, args: Vec<Value>) -> Result<ApiParam, BridgeError> {
    check_shape(fun, &args)?;
    Ok(ApiParam {
        fun: fun.name().to_string(),
        args,
        result: None,
    })
}

/// Decode an envelope into its function and typed arguments.
///
/// Fails with [`BridgeError::UnknownFunction`] when the identifier is not in
/// the table, and [`BridgeError::InvalidArgumentShape`] when the arguments
/// do not match the function's declared shape.
pub fn decode_call(param: &ApiParam) -> Result<(ApiFunction, &[Value]), BridgeError> {
    let fun = ApiFunction::from_str(&param.fun)
        .map_err(|_| BridgeError::UnknownFunction(param.fun.clone()))?;
    check_shape(fun, &param.args)?;
    Ok((fun, &param.args))
}

/// Read the result slot back out of a dispatched envelope.
///
/// `None` if the envelope has not been dispatched; otherwise the success
/// payload or the `(code, reason)` pair.
pub fn decode_result(param: &ApiParam) -> Option<Result<Option<&Value>, (i32, &str)>> {
    match &param.result {
        None => None,
        Some(CallOutcome::Ok { data }) => Some(Ok(data.as_ref())),
        Some(CallOutcome::Err { code, reason }) => Some(Err((*code, reason.as_str()))),
    }
}

/// Validate `args` against the declared shape of `fun`.
pub fn check_shape(fun: ApiFunction, args: &[Value]) -> Result<(), BridgeError> {
    let shape = fun.shape();
    if args.len() != shape.len() {
        return Err(BridgeError::InvalidArgumentShape(format!(
            "{} expects {} argument(s), got {}",
            fun.name(),
            shape.len(),
            args.len()
        )));
    }
    for (value, (name, kind)) in args.iter().zip(shape) {
        if value.kind() != *kind {
            return Err(BridgeError::InvalidArgumentShape(format!(
                "{} argument `{}` expects {}, got {}",
                fun.name(),
                name,
                kind,
                value.kind()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::value::ValueKind;

    fn sample_value(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Bool => Value::Bool(true),
            ValueKind::Int => Value::Int(42),
            ValueKind::Float => Value::Float(1.5),
            ValueKind::Str => Value::str("sample"),
            ValueKind::Bytes => Value::Bytes(vec![1, 2, 3]),
            ValueKind::List => Value::List(vec![Value::str("a")]),
            ValueKind::Map => Value::map([("k", Value::str("v"))]),
        }
    }

    fn sample_args(fun: ApiFunction) -> Vec<Value> {
        fun.shape().iter().map(|(_, kind)| sample_value(*kind)).collect()
    }

    #[test]
    fn test_encode_decode_round_trip_for_every_function() {
        for fun in ApiFunction::iter() {
            let args = sample_args(fun);
            let envelope = encode_call(fun, args.clone()).unwrap();
            let (decoded_fun, decoded_args) = decode_call(&envelope).unwrap();
            assert_eq!(decoded_fun, fun);
            assert_eq!(decoded_args, &args[..]);
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let envelope = encode_call(
            ApiFunction::ClientLogin,
            vec![Value::str("token-1")],
        )
        .unwrap();
        let json = envelope.to_json();
        let back = ApiParam::from_json(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_encode_rejects_wrong_arity() {
        let err = encode_call(ApiFunction::ClientLogin, vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgumentShape(_)));
    }

    #[test]
    fn test_encode_rejects_wrong_kind() {
        let err =
            encode_call(ApiFunction::ClientLogin, vec![Value::Int(5)]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgumentShape(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_function() {
        let envelope = ApiParam {
            fun: "Unknown_op".to_string(),
            args: vec![],
            result: None,
        };
        let err = decode_call(&envelope).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownFunction(_)));
    }

    #[test]
    fn test_malformed_wire_input() {
        // Truncated JSON.
        assert!(matches!(
            ApiParam::from_json("{\"fun\":\"RtmClient_login\",\"args\":[{\"t\":"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
        // Type-tag mismatch inside a value.
        assert!(matches!(
            ApiParam::from_json(
                "{\"fun\":\"RtmClient_login\",\"args\":[{\"t\":\"int\",\"v\":\"nope\"}]}"
            ),
            Err(BridgeError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_result_slot() {
        let mut envelope =
            encode_call(ApiFunction::ClientLogout, vec![]).unwrap();
        assert_eq!(decode_result(&envelope), None);
        assert_eq!(envelope.status(), 0);

        envelope.set_ok(Some(Value::str("payload")));
        assert_eq!(
            decode_result(&envelope),
            Some(Ok(Some(&Value::str("payload"))))
        );
        assert_eq!(envelope.status(), 0);

        envelope.set_err(&BridgeError::HandleNotFound);
        let (code, reason) = decode_result(&envelope).unwrap().unwrap_err();
        assert_eq!(code, -1);
        assert!(!reason.is_empty());
        assert_eq!(envelope.status(), -1);
    }
}
