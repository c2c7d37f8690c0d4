mod common;

use anyhow::Result;
use common::test_service;
use saldo::application::{AppError, HistoryFilter};
use saldo::{EntryType, OrderParams, OrderStatus};

fn params(order_id: i64, account_id: i64, service_id: i64, amount: i64) -> OrderParams {
    OrderParams {
        order_id,
        account_id,
        service_id,
        amount,
    }
}

#[tokio::test]
async fn test_create_order_reserves_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;

    let result = service.create_order(params(1, 1, 3, 4_000)).await?;
    assert_eq!(result.balance, 6_000);
    assert!(result.order.is_pending());
    assert_eq!(result.order.status(), OrderStatus::Pending);

    assert_eq!(service.balance(1).await?, 6_000);

    let order = service.get_order(1).await?;
    assert_eq!(order.account_id, 1);
    assert_eq!(order.service_id, 3);
    assert_eq!(order.amount, 4_000);
    assert!(order.is_pending());

    let page = service.history(1, HistoryFilter::default()).await?;
    let reservations: Vec<_> = page
        .entries
        .iter()
        .filter(|entry| entry.entry_type == EntryType::Reservation)
        .collect();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].amount, 4_000);

    Ok(())
}

#[tokio::test]
async fn test_create_order_duplicate_id_rolls_back_reservation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.credit(2, 10_000).await?;
    service.create_order(params(1, 1, 1, 4_000)).await?;

    // Same order id from another account: the whole unit rolls back,
    // including the reservation that already went through.
    let err = service
        .create_order(params(1, 2, 1, 3_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrderAlreadyExists(1)));

    assert_eq!(service.balance(2).await?, 10_000);
    let page = service.history(2, HistoryFilter::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].entry_type, EntryType::Enrollment);

    Ok(())
}

#[tokio::test]
async fn test_create_order_for_unknown_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .create_order(params(1, 42, 1, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(42)));

    Ok(())
}

#[tokio::test]
async fn test_create_order_with_insufficient_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 500).await?;

    let err = service
        .create_order(params(1, 1, 1, 501))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));

    assert_eq!(service.balance(1).await?, 500);
    let err = service.get_order(1).await.unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound(1)));

    Ok(())
}

#[tokio::test]
async fn test_create_order_rejects_non_positive_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 500).await?;

    for amount in [0, -100] {
        let err = service
            .create_order(params(1, 1, 1, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    Ok(())
}

#[tokio::test]
async fn test_pay_order_is_state_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;

    service.pay_order(params(5, 1, 2, 4_000)).await?;

    // Payment changes nothing but the flags: the money moved at
    // reservation time.
    assert_eq!(service.balance(1).await?, 6_000);
    let order = service.get_order(5).await?;
    assert!(order.is_paid);
    assert!(!order.is_cancelled);
    assert_eq!(order.status(), OrderStatus::Paid);

    let page = service.history(1, HistoryFilter::default()).await?;
    assert_eq!(page.total, 2); // enrollment + reservation, nothing more

    Ok(())
}

#[tokio::test]
async fn test_pay_order_twice_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;
    service.pay_order(params(5, 1, 2, 4_000)).await?;

    let err = service.pay_order(params(5, 1, 2, 4_000)).await.unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound(5)));
    assert_eq!(service.balance(1).await?, 6_000);

    Ok(())
}

#[tokio::test]
async fn test_pay_order_field_mismatch_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.credit(2, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;

    // Wrong amount, wrong service, wrong account: all indistinguishable
    // from a missing order.
    for wrong in [
        params(5, 1, 2, 4_001),
        params(5, 1, 3, 4_000),
        params(5, 2, 2, 4_000),
        params(6, 1, 2, 4_000),
    ] {
        let err = service.pay_order(wrong).await.unwrap_err();
        assert!(matches!(err, AppError::OrderNotFound(_)));
    }

    assert!(service.get_order(5).await?.is_pending());

    Ok(())
}

#[tokio::test]
async fn test_cancel_order_returns_reservation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;

    let balance = service.cancel_order(params(5, 1, 2, 4_000)).await?;
    assert_eq!(balance, 10_000);
    assert_eq!(service.balance(1).await?, 10_000);

    let order = service.get_order(5).await?;
    assert!(order.is_cancelled);
    assert!(!order.is_paid);

    // The cancellation entry undoes exactly what the reservation took.
    let page = service.history(1, HistoryFilter::default()).await?;
    let reservation = page
        .entries
        .iter()
        .find(|entry| entry.entry_type == EntryType::Reservation)
        .expect("reservation entry");
    let cancellation = page
        .entries
        .iter()
        .find(|entry| entry.entry_type == EntryType::CancelReservation)
        .expect("cancel_reservation entry");
    assert_eq!(cancellation.amount, reservation.amount);

    Ok(())
}

#[tokio::test]
async fn test_cancel_order_twice_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;
    service.cancel_order(params(5, 1, 2, 4_000)).await?;

    let err = service
        .cancel_order(params(5, 1, 2, 4_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound(5)));

    // The second cancellation must not return the money again.
    assert_eq!(service.balance(1).await?, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_paid_order_cannot_be_cancelled() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;
    service.pay_order(params(5, 1, 2, 4_000)).await?;

    let err = service
        .cancel_order(params(5, 1, 2, 4_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound(5)));

    assert_eq!(service.balance(1).await?, 6_000);
    assert!(service.get_order(5).await?.is_paid);

    Ok(())
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_paid() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.credit(1, 10_000).await?;
    service.create_order(params(5, 1, 2, 4_000)).await?;
    service.cancel_order(params(5, 1, 2, 4_000)).await?;

    let err = service.pay_order(params(5, 1, 2, 4_000)).await.unwrap_err();
    assert!(matches!(err, AppError::OrderNotFound(5)));

    assert_eq!(service.balance(1).await?, 10_000);
    assert!(service.get_order(5).await?.is_cancelled);

    Ok(())
}

#[tokio::test]
async fn test_balance_walkthrough() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_eq!(service.credit(1, 100).await?, 100);

    let created = service.create_order(params(1, 1, 1, 40)).await?;
    assert_eq!(created.balance, 60);
    assert!(created.order.is_pending());

    service.pay_order(params(1, 1, 1, 40)).await?;
    assert_eq!(service.balance(1).await?, 60);

    let created = service.create_order(params(2, 1, 1, 50)).await?;
    assert_eq!(created.balance, 10);

    let balance = service.cancel_order(params(2, 1, 1, 50)).await?;
    assert_eq!(balance, 60);
    assert!(service.get_order(2).await?.is_cancelled);

    Ok(())
}
