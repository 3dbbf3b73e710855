//! In-memory shop and notifier shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tcg_stock_watch::infrastructure::{FetchError, FetchedPage, Notifier, NotifyError, PageFetcher};

#[derive(Default)]
pub struct FakeShop {
    pages: Mutex<HashMap<String, Result<String, u16>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeShop {
    pub fn serve(&self, url: &str, body: &str) {
        self.pages.lock().unwrap().insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn fail(&self, url: &str, code: u16) {
        self.pages.lock().unwrap().insert(url.to_string(), Err(code));
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl PageFetcher for FakeShop {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url).cloned() {
            Some(Ok(body)) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body,
            }),
            Some(Err(code)) => Err(FetchError::Status {
                url: url.to_string(),
                code,
            }),
            None => Err(FetchError::Timeout { url: url.to_string() }),
        }
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    messages: Mutex<Vec<String>>,
    down: AtomicBool,
}

impl FakeNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub fn listing(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!(r#"<li><a href="{href}">{text}</a></li>"#))
        .collect();
    format!("<html><body><ul>{anchors}</ul></body></html>")
}

pub fn detail(title: &str, status: &str) -> String {
    format!(r#"<html><body><h1>{title}</h1><span class="price">159,90 €</span><p>{status}</p></body></html>"#)
}
