use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 查询参数序列化函数
pub type SerializeFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// 数组参数的编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayFormat {
    /// `ids[]=1&ids[]=2&ids[]=3`
    Brackets,
    /// `ids=1,2,3`
    Comma,
    /// `ids[0]=1&ids[1]=2&ids[2]=3`
    Indices,
    /// `ids=1&ids=2&ids=3`
    Repeat,
}

/// 参数序列化方式
///
/// 预置四种数组格式，也可以传入自定义函数。无法识别的名称保留为
/// `Unresolved`，交给传输层自己的序列化器处理。
#[derive(Clone)]
pub enum ParamsSerializer {
    Brackets,
    Comma,
    Indices,
    Repeat,
    Custom(SerializeFn),
    Unresolved(String),
}

impl ParamsSerializer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        ParamsSerializer::Custom(Arc::new(f))
    }

    pub fn array_format(&self) -> Option<ArrayFormat> {
        match self {
            ParamsSerializer::Brackets => Some(ArrayFormat::Brackets),
            ParamsSerializer::Comma => Some(ArrayFormat::Comma),
            ParamsSerializer::Indices => Some(ArrayFormat::Indices),
            ParamsSerializer::Repeat => Some(ArrayFormat::Repeat),
            ParamsSerializer::Custom(_) | ParamsSerializer::Unresolved(_) => None,
        }
    }

    /// 解析为序列化函数；`None` 表示沿用传输层默认实现
    pub fn resolve(&self) -> Option<SerializeFn> {
        match self {
            ParamsSerializer::Custom(f) => Some(Arc::clone(f)),
            ParamsSerializer::Unresolved(_) => None,
            named => {
                let format = named.array_format()?;
                let serialize: SerializeFn =
                    Arc::new(move |params: &Value| stringify(params, format));
                Some(serialize)
            }
        }
    }
}

impl From<&str> for ParamsSerializer {
    fn from(name: &str) -> Self {
        match name {
            "brackets" => ParamsSerializer::Brackets,
            "comma" => ParamsSerializer::Comma,
            "indices" => ParamsSerializer::Indices,
            "repeat" => ParamsSerializer::Repeat,
            other => ParamsSerializer::Unresolved(other.to_string()),
        }
    }
}

impl From<ArrayFormat> for ParamsSerializer {
    fn from(format: ArrayFormat) -> Self {
        match format {
            ArrayFormat::Brackets => ParamsSerializer::Brackets,
            ArrayFormat::Comma => ParamsSerializer::Comma,
            ArrayFormat::Indices => ParamsSerializer::Indices,
            ArrayFormat::Repeat => ParamsSerializer::Repeat,
        }
    }
}

impl<'de> Deserialize<'de> for ParamsSerializer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(ParamsSerializer::from(name.as_str()))
    }
}

impl PartialEq for ParamsSerializer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamsSerializer::Custom(a), ParamsSerializer::Custom(b)) => Arc::ptr_eq(a, b),
            (ParamsSerializer::Unresolved(a), ParamsSerializer::Unresolved(b)) => a == b,
            (a, b) => a.array_format().is_some() && a.array_format() == b.array_format(),
        }
    }
}

impl fmt::Debug for ParamsSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsSerializer::Brackets => f.write_str("Brackets"),
            ParamsSerializer::Comma => f.write_str("Comma"),
            ParamsSerializer::Indices => f.write_str("Indices"),
            ParamsSerializer::Repeat => f.write_str("Repeat"),
            ParamsSerializer::Custom(_) => f.write_str("Custom(..)"),
            ParamsSerializer::Unresolved(name) => f.debug_tuple("Unresolved").field(name).finish(),
        }
    }
}

/// 把参数对象编码为查询字符串
///
/// 键和值会做百分号编码，格式本身产生的 `[]`、`,` 保持原样。
/// 非对象的参数得到空字符串。
pub fn stringify(params: &Value, format: ArrayFormat) -> String {
    let mut pairs = Vec::new();
    if let Value::Object(map) = params {
        for (key, value) in map {
            append_pairs(&mut pairs, urlencoding::encode(key).into_owned(), value, format);
        }
    }
    pairs.join("&")
}

fn append_pairs(pairs: &mut Vec<String>, prefix: String, value: &Value, format: ArrayFormat) {
    match value {
        Value::Null => pairs.push(format!("{prefix}=")),
        Value::Array(items) => match format {
            ArrayFormat::Comma => {
                if items.is_empty() {
                    return;
                }
                let joined = items
                    .iter()
                    .map(|item| urlencoding::encode(&scalar_text(item)).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.push(format!("{prefix}={joined}"));
            }
            ArrayFormat::Brackets => {
                for item in items {
                    append_pairs(pairs, format!("{prefix}[]"), item, format);
                }
            }
            ArrayFormat::Indices => {
                for (index, item) in items.iter().enumerate() {
                    append_pairs(pairs, format!("{prefix}[{index}]"), item, format);
                }
            }
            ArrayFormat::Repeat => {
                for item in items {
                    append_pairs(pairs, prefix.clone(), item, format);
                }
            }
        },
        Value::Object(map) => {
            for (key, nested) in map {
                let key = urlencoding::encode(key);
                append_pairs(pairs, format!("{prefix}[{key}]"), nested, format);
            }
        }
        scalar => pairs.push(format!(
            "{prefix}={}",
            urlencoding::encode(&scalar_text(scalar))
        )),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(serializer: &str, params: &Value) -> String {
        let serialize = ParamsSerializer::from(serializer)
            .resolve()
            .expect("named serializer should resolve");
        serialize(params)
    }

    #[test]
    fn test_array_formats() {
        let params = json!({"ids": [1, 2, 3]});

        assert_eq!(encode("brackets", &params), "ids[]=1&ids[]=2&ids[]=3");
        assert_eq!(encode("comma", &params), "ids=1,2,3");
        assert_eq!(encode("indices", &params), "ids[0]=1&ids[1]=2&ids[2]=3");
        assert_eq!(encode("repeat", &params), "ids=1&ids=2&ids=3");
    }

    #[test]
    fn test_unknown_name_defers_to_transport() {
        let serializer = ParamsSerializer::from("qs-extended");
        assert_eq!(serializer, ParamsSerializer::Unresolved("qs-extended".into()));
        assert!(serializer.resolve().is_none());
    }

    #[test]
    fn test_custom_serializer_is_used_as_is() {
        let serializer = ParamsSerializer::custom(|_| "fixed=1".to_string());
        let serialize = serializer.resolve().unwrap();
        assert_eq!(serialize(&json!({"a": 1})), "fixed=1");
        // 同一个函数实例才相等
        assert_eq!(serializer, serializer.clone());
        assert_ne!(serializer, ParamsSerializer::custom(|_| "fixed=1".to_string()));
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let params = json!({"q": "a b&c", "tags": ["x/y", "z"]});
        assert_eq!(
            stringify(&params, ArrayFormat::Comma),
            "q=a%20b%26c&tags=x%2Fy,z"
        );
    }

    #[test]
    fn test_nested_objects_and_nulls() {
        let params = json!({"page": null, "user": {"name": "ann", "roles": ["a"]}});
        assert_eq!(
            stringify(&params, ArrayFormat::Indices),
            "page=&user[name]=ann&user[roles][0]=a"
        );
    }

    #[test]
    fn test_empty_array_produces_nothing() {
        let params = json!({"ids": [], "page": 1});
        assert_eq!(stringify(&params, ArrayFormat::Comma), "page=1");
        assert_eq!(stringify(&params, ArrayFormat::Brackets), "page=1");
    }

    #[test]
    fn test_deserialize_from_name() {
        let serializer: ParamsSerializer = serde_json::from_str("\"repeat\"").unwrap();
        assert_eq!(serializer, ParamsSerializer::Repeat);
    }
}
