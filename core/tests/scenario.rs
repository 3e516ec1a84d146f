//! End-to-end pipeline runs over the built-in catalog with stubbed
//! collaborators: a closure stands in for the model and another for the
//! network, so every stage's input can be inspected.

use std::cell::RefCell;

use askapi_core::catalog::BUILTIN_CATALOG;
use askapi_core::executor::EXECUTION_FAILED;
use askapi_core::humanizer::{HUMANIZER_FALLBACK, HUMANIZER_SYSTEM_PROMPT};
use askapi_core::synthesizer::UNKNOWN_ERROR;
use askapi_core::{
    Catalog, CompletionError, HashingEncoder, HttpMethod, HttpRequest, HttpResponse, Intent,
    Orchestrator, RequestExecutor, RouterConfig, SemanticRouter, TransportError,
};
use chrono::NaiveDate;

const UNSUPPORTED: &str =
    "I can only answer questions about the weather, finance, news, and cryptocurrencies.";

fn catalog() -> Catalog {
    Catalog::from_json_with(BUILTIN_CATALOG, |name| {
        (name == "WEATHER_API_KEY").then(|| "wk-test".to_string())
    })
    .unwrap()
}

fn router(catalog: &Catalog) -> SemanticRouter<HashingEncoder> {
    SemanticRouter::new(HashingEncoder::default(), catalog.routes(), RouterConfig::default()).unwrap()
}

/// The catalog's own worked example for `prompt`, serialized the way the
/// model is asked to answer.
fn example_reply(catalog: &Catalog, api: &str, prompt: &str) -> String {
    let example = catalog
        .profile(api)
        .unwrap()
        .examples
        .iter()
        .find(|e| e.prompt == prompt)
        .unwrap();
    serde_json::to_string_pretty(&example.request).unwrap()
}

fn ok_json(body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string(),
    })
}

#[derive(Default)]
struct Calls {
    prompts: RefCell<Vec<(String, String)>>,
    requests: RefCell<Vec<HttpRequest>>,
}

#[test]
fn ethereum_price_end_to_end() {
    let catalog = catalog();
    let reply = format!(
        "```json\n{}\n```",
        example_reply(&catalog, "coincap", "Get the current price of Ethereum.")
    );
    let calls = Calls::default();

    let completion = |system: &str, user: &str| -> Result<String, CompletionError> {
        calls.prompts.borrow_mut().push((system.to_string(), user.to_string()));
        if system == HUMANIZER_SYSTEM_PROMPT {
            Ok("Ethereum is currently trading at about $3,300.".to_string())
        } else {
            Ok(reply.clone())
        }
    };
    let transport = |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
        calls.requests.borrow_mut().push(request.clone());
        ok_json(r#"{"data": {"id": "ethereum", "symbol": "ETH", "priceUsd": "3300.1234"}, "timestamp": 1736000000000}"#)
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport))
        .with_today(NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());

    let answer = orchestrator.answer("Get the current price of Ethereum.").unwrap();
    assert_eq!(answer.intent, Intent::Matched("coin".to_string()));
    assert_eq!(answer.api.as_deref(), Some("coincap"));
    assert_eq!(answer.text, "Ethereum is currently trading at about $3,300.");

    let request = answer.request.as_ref().unwrap();
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.full_url(), "https://api.coincap.io/v2/assets/ethereum");
    assert_eq!(
        answer.api_response.as_deref(),
        Some(r#"{"data":{"id":"ethereum","symbol":"ETH","priceUsd":"3300.1234"},"timestamp":1736000000000}"#)
    );

    let requests = calls.requests.borrow();
    assert_eq!(requests.as_slice(), std::slice::from_ref(request));

    let prompts = calls.prompts.borrow();
    assert_eq!(prompts.len(), 2);
    let (system, user) = &prompts[0];
    assert!(system.contains("CoinCap v2"));
    assert!(system.contains("https://api.coincap.io"));
    assert!(system.contains("Today is Saturday, January 4, 2025."));
    assert_eq!(user, "Get the current price of Ethereum.");

    let (system, user) = &prompts[1];
    assert_eq!(system, HUMANIZER_SYSTEM_PROMPT);
    assert!(user.starts_with("The user asked: \"Get the current price of Ethereum.\"."));
    assert!(user.contains(r#""priceUsd":"3300.1234""#));
}

#[test]
fn holidays_end_to_end() {
    let catalog = catalog();
    let completion = |system: &str, _: &str| -> Result<String, CompletionError> {
        if system == HUMANIZER_SYSTEM_PROMPT {
            return Ok("The next public holiday in Germany is Easter Monday.".to_string());
        }
        assert!(system.contains("Nager.Date"));
        Ok(r#"{"method":"GET","server":"https://date.nager.at","path":"api/v3/NextPublicHolidays/DE","query":null,"headers":null,"body":null}"#.to_string())
    };
    let transport = |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
        assert_eq!(request.full_url(), "https://date.nager.at/api/v3/NextPublicHolidays/DE");
        ok_json(r#"[{"date":"2025-04-21","name":"Easter Monday","countryCode":"DE"}]"#)
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("When is the next public holiday in Germany?").unwrap();

    assert_eq!(answer.intent, Intent::Matched("public_holidays".to_string()));
    assert_eq!(answer.api.as_deref(), Some("nager"));
    assert_eq!(answer.text, "The next public holiday in Germany is Easter Monday.");
}

#[test]
fn unsupported_intents_never_reach_collaborators() {
    let catalog = catalog();
    let completion = |_: &str, _: &str| -> Result<String, CompletionError> {
        panic!("completion must not be called");
    };
    let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
        panic!("transport must not be called");
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));

    for (query, intent) in [
        ("Son haberler neler?", Intent::Matched("news".to_string())),
        ("Dolar kuru nedir?", Intent::Matched("finance".to_string())),
        ("zzzz qqqq xxxx", Intent::NoMatch),
        ("   ", Intent::NoMatch),
    ] {
        let answer = orchestrator.answer(query).unwrap();
        assert_eq!(answer.intent, intent, "query: {query:?}");
        assert_eq!(answer.text, UNSUPPORTED, "query: {query:?}");
        assert!(answer.api.is_none());
        assert!(answer.request.is_none());
    }
}

#[test]
fn model_refusal_reaches_user_verbatim() {
    let catalog = catalog();
    let completion = |system: &str, _: &str| -> Result<String, CompletionError> {
        assert_ne!(system, HUMANIZER_SYSTEM_PROMPT);
        Ok("```json\n{\"error\": \"CoinCap bu soruyu yanıtlayamaz.\"}\n```".to_string())
    };
    let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
        panic!("transport must not be called");
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("Bitcoin fiyatı nedir?").unwrap();

    assert_eq!(answer.intent, Intent::Matched("coin".to_string()));
    assert_eq!(answer.text, "CoinCap bu soruyu yanıtlayamaz.");
}

#[test]
fn completion_outage_during_synthesis() {
    let catalog = catalog();
    let completion = |_: &str, _: &str| -> Result<String, CompletionError> {
        Err(TransportError::Io("connection refused".to_string()).into())
    };
    let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
        panic!("transport must not be called");
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("What is the price of Bitcoin?").unwrap();
    assert_eq!(answer.text, UNKNOWN_ERROR);
}

#[test]
fn api_error_stops_before_humanizer() {
    let catalog = catalog();
    let reply = example_reply(&catalog, "coincap", "Get the current price of Ethereum.");
    let completion = |system: &str, _: &str| -> Result<String, CompletionError> {
        assert_ne!(system, HUMANIZER_SYSTEM_PROMPT, "humanizer must not run");
        Ok(reply.clone())
    };
    let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 429,
            headers: Vec::new(),
            body: r#"{"error":"rate limited"}"#.to_string(),
        })
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("Get the current price of Ethereum.").unwrap();

    assert_eq!(answer.text, EXECUTION_FAILED);
    assert!(answer.request.is_some());
    assert!(answer.api_response.is_none());
}

#[test]
fn humanizer_outage_becomes_apology() {
    let catalog = catalog();
    let reply = example_reply(&catalog, "coincap", "Get the current price of Ethereum.");
    let completion = |system: &str, _: &str| -> Result<String, CompletionError> {
        if system == HUMANIZER_SYSTEM_PROMPT {
            Err(CompletionError::EmptyChoice)
        } else {
            Ok(reply.clone())
        }
    };
    let transport = |_: &HttpRequest| ok_json(r#"{"data":{"priceUsd":"3300"}}"#);

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("Get the current price of Ethereum.").unwrap();

    assert_eq!(answer.text, HUMANIZER_FALLBACK);
    assert_eq!(answer.api_response.as_deref(), Some(r#"{"data":{"priceUsd":"3300"}}"#));
}

#[test]
fn weather_request_carries_configured_key() {
    let catalog = catalog();
    let completion = |system: &str, _: &str| -> Result<String, CompletionError> {
        if system == HUMANIZER_SYSTEM_PROMPT {
            return Ok("It is 18°C and sunny in Paris.".to_string());
        }
        assert!(system.contains("wk-test"));
        Ok(r#"{"method":"GET","server":"http://api.weatherapi.com/v1","path":"/current.json","query":{"key":"wk-test","q":"Paris"},"headers":null,"body":null}"#.to_string())
    };
    let transport = |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
        assert_eq!(request.full_url(), "http://api.weatherapi.com/v1/current.json?key=wk-test&q=Paris");
        ok_json(r#"{"current":{"temp_c":18.0,"condition":{"text":"Sunny"}}}"#)
    };

    let router = router(&catalog);
    let orchestrator = Orchestrator::new(catalog, router, completion, RequestExecutor::new(transport));
    let answer = orchestrator.answer("What is the weather like in Paris?").unwrap();

    assert_eq!(answer.intent, Intent::Matched("weather".to_string()));
    assert_eq!(answer.text, "It is 18°C and sunny in Paris.");
}
